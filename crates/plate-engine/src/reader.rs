//! End-to-end plate reading.
//!
//! detector → resolver → crop → segmenter → normalizer → classifier →
//! corrector, for one image, one pre-cropped plate or a batch of images.

use anyhow::{Context, Result};
use common::{validation, Alphabet, Detection, RawDetection, Rect, ScoreVector};
use image::RgbImage;
use serde::Serialize;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::corrector::{GlyphPrediction, RecognitionCorrector, Substitution};
use crate::crop::crop_resolution;
use crate::normalizer::GlyphNormalizer;
use crate::plugin::{CharacterClassifier, PlateDetector};
use crate::resolver::DetectionResolver;
use crate::segmentation::{NoopObserver, PlateSegmenter, SegmentationObserver};

/// Text read from one plate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateReading {
    /// Plate box in the source image; `None` when reading a pre-cropped plate
    pub bbox: Option<Rect>,

    /// Full text, sections separated by a single space
    pub text: String,
    pub first_section: String,
    pub second_section: Option<String>,
    pub glyph_count: usize,
    pub substitutions: Vec<Substitution>,
}

/// One vehicle and the plates read from it. The last entry of an
/// [`ImageReading`] has no vehicle and holds the unassigned plates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleReading {
    pub vehicle: Option<Detection>,
    pub plates: Vec<PlateReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReading {
    pub entries: Vec<VehicleReading>,

    /// Detector boxes rejected at ingestion (non-finite, inverted or empty)
    pub malformed_detections: usize,

    /// Plates dropped as duplicates of a larger overlapping plate
    pub duplicate_plates: usize,

    /// Plates whose box lies entirely outside the image
    pub plates_outside_image: usize,
}

impl ImageReading {
    /// Total number of detections that produced no output
    pub fn dropped_detections(&self) -> usize {
        self.malformed_detections + self.duplicate_plates + self.plates_outside_image
    }

    pub fn plates(&self) -> impl Iterator<Item = &PlateReading> + '_ {
        self.entries.iter().flat_map(|entry| entry.plates.iter())
    }

    pub fn texts(&self) -> Vec<String> {
        self.plates().map(|plate| plate.text.clone()).collect()
    }
}

/// Per-image result of a batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    Read(ImageReading),
    Failed { error: String },
}

impl ImageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn reading(&self) -> Option<&ImageReading> {
        match self {
            Self::Read(reading) => Some(reading),
            Self::Failed { .. } => None,
        }
    }
}

/// Reads license plates with the supplied detector and classifier
pub struct PlateReader<'a, D, C> {
    detector: D,
    classifier: C,
    alphabet: &'a Alphabet,
    resolver: DetectionResolver,
    segmenter: PlateSegmenter,
    normalizer: GlyphNormalizer,
    corrector: RecognitionCorrector,
}

impl<'a, D, C> PlateReader<'a, D, C>
where
    D: PlateDetector,
    C: CharacterClassifier,
{
    pub fn new(detector: D, classifier: C, alphabet: &'a Alphabet, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector,
            classifier,
            alphabet,
            resolver: DetectionResolver::new(config.resolver)?,
            segmenter: PlateSegmenter::new(config.segmentation)?,
            normalizer: GlyphNormalizer::new(config.normalizer)?,
            corrector: RecognitionCorrector::default(),
        })
    }

    /// Replace the default vehicle-code corrector
    pub fn with_corrector(mut self, corrector: RecognitionCorrector) -> Self {
        self.corrector = corrector;
        self
    }

    pub fn alphabet(&self) -> &'a Alphabet {
        self.alphabet
    }

    /// Read every plate in a full image
    pub fn read_image(&self, image: &RgbImage) -> Result<ImageReading> {
        let result = self.read_image_inner(image);
        let status = if result.is_ok() { "ok" } else { "failed" };
        telemetry::metrics::IMAGES_PROCESSED
            .with_label_values(&[status])
            .inc();
        result
    }

    fn read_image_inner(&self, image: &RgbImage) -> Result<ImageReading> {
        validation::validate_dimensions(image.width(), image.height(), "image")?;
        let started = Instant::now();

        let raw = self
            .detector
            .detect(image)
            .with_context(|| format!("detector '{}' failed", self.detector.id()))?;
        let detections = ingest(&raw);
        let malformed = raw.len() - detections.len();

        let resolution = self.resolver.resolve(&detections);

        let cropped = crop_resolution(image, &resolution);
        let mut entries = Vec::with_capacity(cropped.len());
        let mut outside = 0;
        for entry in cropped {
            outside += entry.plates_outside;
            let mut readings = Vec::with_capacity(entry.plates.len());
            for plate in &entry.plates {
                let bbox = plate.detection.bbox;
                let mut reading = self
                    .read_plate_with(&plate.image, &mut NoopObserver)
                    .with_context(|| format!("failed to read plate at {:?}", bbox))?;
                reading.bbox = Some(bbox);
                readings.push(reading);
            }
            entries.push(VehicleReading {
                vehicle: entry.vehicle.copied(),
                plates: readings,
            });
        }

        let reading = ImageReading {
            entries,
            malformed_detections: malformed,
            duplicate_plates: resolution.duplicates_removed,
            plates_outside_image: outside,
        };

        tracing::info!(
            width = image.width(),
            height = image.height(),
            detections = raw.len(),
            vehicles = resolution.vehicles.len(),
            plates = reading.plates().count(),
            malformed = reading.malformed_detections,
            duplicates = reading.duplicate_plates,
            outside = reading.plates_outside_image,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "read image"
        );

        Ok(reading)
    }

    /// Read an already cropped plate
    pub fn read_plate(&self, plate: &RgbImage) -> Result<PlateReading> {
        self.read_plate_with(plate, &mut NoopObserver)
    }

    /// Read an already cropped plate, reporting segmentation stages to
    /// `observer`
    pub fn read_plate_with(
        &self,
        plate: &RgbImage,
        observer: &mut dyn SegmentationObserver,
    ) -> Result<PlateReading> {
        let segmentation = self.segmenter.segment_with(plate, observer)?;

        let predictions = segmentation
            .glyphs
            .iter()
            .enumerate()
            .map(|(idx, glyph)| {
                let normalized = self.normalizer.normalize(&glyph.raster)?;
                let scores = self
                    .classifier
                    .classify(&normalized)
                    .with_context(|| {
                        format!("classifier '{}' failed on glyph {}", self.classifier.id(), idx)
                    })?;
                let scores = ScoreVector::new(self.alphabet, scores)
                    .with_context(|| format!("malformed scores for glyph {}", idx))?;
                GlyphPrediction::from_scores(scores)
                    .with_context(|| format!("no prediction for glyph {}", idx))
            })
            .collect::<Result<Vec<_>>>()?;

        let corrected = self.corrector.correct(&predictions, segmentation.section_gap);
        let text = corrected.text();
        tracing::debug!(
            text = %text,
            glyphs = predictions.len(),
            substitutions = corrected.substitutions.len(),
            "read plate"
        );

        Ok(PlateReading {
            bbox: None,
            text,
            first_section: corrected.first_section,
            second_section: corrected.second_section,
            glyph_count: predictions.len(),
            substitutions: corrected.substitutions,
        })
    }

    /// Read many images. A failing image is recorded and the batch continues.
    pub fn read_batch<'i, I>(&self, images: I) -> Vec<ImageOutcome>
    where
        I: IntoIterator<Item = &'i RgbImage>,
    {
        images
            .into_iter()
            .enumerate()
            .map(|(idx, image)| match self.read_image(image) {
                Ok(reading) => ImageOutcome::Read(reading),
                Err(e) => {
                    tracing::warn!(image = idx, error = %format!("{:#}", e), "failed to read image");
                    ImageOutcome::Failed {
                        error: format!("{:#}", e),
                    }
                }
            })
            .collect()
    }
}

/// Convert raw detector output, dropping malformed boxes
fn ingest(raw: &[RawDetection]) -> Vec<Detection> {
    raw.iter()
        .filter_map(|r| match Detection::try_from(r) {
            Ok(detection) => Some(detection),
            Err(e) => {
                tracing::warn!(class_id = r.class_id, error = %e, "dropping malformed detection");
                None
            }
        })
        .collect()
}
