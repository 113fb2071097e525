//! Plate segmentation: isolate individual glyphs from a plate crop and locate
//! the gap between the regional code and the vehicle code.
//!
//! Pipeline:
//! 1. Gaussian blur
//! 2. `|blue - red|` band mask, so the colored side band is ignored
//! 3. Local Gaussian threshold on the value channel, dark strokes on
//! 4. AND of 2 and 3
//! 5. Connected components filtered by plate-relative size, shape and
//!    border contact, painted back and ANDed with the binary image
//! 6. Components re-extracted, sorted left to right and cropped
//! 7. Widest positive gap between neighbouring glyphs

pub mod binarize;
pub mod components;
pub mod observer;

use anyhow::{Context, Result};
use common::validation;
use image::{imageops, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use components::{section_gap, Components, GlyphFilter};
pub use observer::{
    Checkpoint, DirectoryDump, NoopObserver, RecordedImage, RecordingObserver,
    SegmentationObserver, StageImage,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Gaussian blur kernel side (odd)
    #[serde(default = "default_blur_kernel_size")]
    pub blur_kernel_size: u32,

    /// `|blue - red|` above this marks the colored side band
    #[serde(default = "default_channel_diff_threshold")]
    pub channel_diff_threshold: u8,

    /// Neighbourhood size of the local threshold (odd)
    #[serde(default = "default_adaptive_block_size")]
    pub adaptive_block_size: u32,

    /// Subtracted from the local weighted mean
    #[serde(default = "default_adaptive_offset")]
    pub adaptive_offset: f32,

    /// Glyph height limits as a fraction of plate height
    #[serde(default = "default_min_char_height_factor")]
    pub min_char_height_factor: f32,

    #[serde(default = "default_max_char_height_factor")]
    pub max_char_height_factor: f32,

    /// Glyph aspect (height / width) limits
    #[serde(default = "default_min_char_aspect")]
    pub min_char_aspect: f32,

    #[serde(default = "default_max_char_aspect")]
    pub max_char_aspect: f32,

    /// Glyph width limits as a fraction of plate width
    #[serde(default = "default_min_char_width_factor")]
    pub min_char_width_factor: f32,

    #[serde(default = "default_max_char_width_factor")]
    pub max_char_width_factor: f32,
}

fn default_blur_kernel_size() -> u32 {
    5
}

fn default_channel_diff_threshold() -> u8 {
    40
}

fn default_adaptive_block_size() -> u32 {
    61
}

fn default_adaptive_offset() -> f32 {
    15.0
}

fn default_min_char_height_factor() -> f32 {
    0.4
}

fn default_max_char_height_factor() -> f32 {
    0.9
}

fn default_min_char_aspect() -> f32 {
    1.0
}

fn default_max_char_aspect() -> f32 {
    10.0
}

fn default_min_char_width_factor() -> f32 {
    0.015
}

fn default_max_char_width_factor() -> f32 {
    0.18
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: default_blur_kernel_size(),
            channel_diff_threshold: default_channel_diff_threshold(),
            adaptive_block_size: default_adaptive_block_size(),
            adaptive_offset: default_adaptive_offset(),
            min_char_height_factor: default_min_char_height_factor(),
            max_char_height_factor: default_max_char_height_factor(),
            min_char_aspect: default_min_char_aspect(),
            max_char_aspect: default_max_char_aspect(),
            min_char_width_factor: default_min_char_width_factor(),
            max_char_width_factor: default_max_char_width_factor(),
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<()> {
        validation::validate_odd(self.blur_kernel_size, "blur_kernel_size")?;
        validation::validate_odd(self.adaptive_block_size, "adaptive_block_size")?;
        validation::validate_range(
            self.adaptive_block_size,
            3,
            validation::MAX_BLOCK_SIZE,
            "adaptive_block_size",
        )?;
        if !self.adaptive_offset.is_finite() {
            anyhow::bail!("adaptive_offset must be finite, got {}", self.adaptive_offset);
        }

        validation::validate_unit_interval(self.min_char_height_factor, "min_char_height_factor")?;
        validation::validate_unit_interval(self.max_char_height_factor, "max_char_height_factor")?;
        validation::validate_ordered(
            self.min_char_height_factor,
            self.max_char_height_factor,
            "char_height_factor",
        )?;

        validation::validate_positive(self.min_char_aspect, "min_char_aspect")?;
        validation::validate_positive(self.max_char_aspect, "max_char_aspect")?;
        validation::validate_ordered(self.min_char_aspect, self.max_char_aspect, "char_aspect")?;

        validation::validate_unit_interval(self.min_char_width_factor, "min_char_width_factor")?;
        validation::validate_unit_interval(self.max_char_width_factor, "max_char_width_factor")?;
        validation::validate_ordered(
            self.min_char_width_factor,
            self.max_char_width_factor,
            "char_width_factor",
        )?;

        Ok(())
    }
}

/// One isolated glyph with its horizontal extent on the plate
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphSegment {
    /// Binary crop of the glyph's bounding box (strokes white)
    pub raster: GrayImage,

    /// Left edge (inclusive) on the plate
    pub left_x: u32,

    /// Right edge (exclusive) on the plate
    pub right_x: u32,
}

/// Glyphs in reading order plus the section gap
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Segmentation {
    pub glyphs: Vec<GlyphSegment>,

    /// Index of the first glyph of the second section, if a unique widest
    /// gap was found
    pub section_gap: Option<usize>,
}

impl Segmentation {
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// Splits plate crops into glyph rasters
#[derive(Debug, Clone)]
pub struct PlateSegmenter {
    config: SegmentationConfig,
}

impl PlateSegmenter {
    pub fn new(config: SegmentationConfig) -> Result<Self> {
        config.validate().context("invalid segmentation config")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn segment(&self, plate: &RgbImage) -> Result<Segmentation> {
        self.segment_with(plate, &mut NoopObserver)
    }

    /// Segment `plate`, reporting intermediates to `observer`
    pub fn segment_with(
        &self,
        plate: &RgbImage,
        observer: &mut dyn SegmentationObserver,
    ) -> Result<Segmentation> {
        validation::validate_dimensions(plate.width(), plate.height(), "plate crop")?;

        let started = Instant::now();
        let diagnostics = observer.enabled();
        notify(observer, Checkpoint::Original, StageImage::Rgb(plate));

        let blurred = binarize::blur(plate, self.config.blur_kernel_size);
        notify(observer, Checkpoint::Blurred, StageImage::Rgb(&blurred));

        if diagnostics {
            notify(observer, Checkpoint::Blue, StageImage::Gray(&binarize::blue_channel(&blurred)));
            notify(observer, Checkpoint::Red, StageImage::Gray(&binarize::red_channel(&blurred)));
        }

        let difference = binarize::channel_difference(&blurred);
        notify(observer, Checkpoint::ChannelDiff, StageImage::Gray(&difference));

        let band_mask = binarize::band_mask(&difference, self.config.channel_diff_threshold);
        notify(observer, Checkpoint::BandMask, StageImage::Gray(&band_mask));

        let value = binarize::value_channel(&blurred);
        notify(observer, Checkpoint::Value, StageImage::Gray(&value));

        let threshold = binarize::local_threshold(
            &value,
            self.config.adaptive_block_size,
            self.config.adaptive_offset,
        );
        if diagnostics {
            let surface = binarize::threshold_image(value.width(), value.height(), &threshold);
            notify(observer, Checkpoint::Threshold, StageImage::Gray(&surface));
        }

        let foreground = binarize::dark_foreground(&value, &threshold);
        let binary = binarize::mask_and(&foreground, &band_mask);
        notify(observer, Checkpoint::Binary, StageImage::Gray(&binary));

        let filter = GlyphFilter::for_plate(&self.config, plate.width(), plate.height());
        let candidates = Components::extract(&binary);
        let glyph_mask = candidates.paint(|bounds| filter.accepts(bounds));
        notify(observer, Checkpoint::GlyphMask, StageImage::Gray(&glyph_mask));

        let cleaned = binarize::mask_and(&binary, &glyph_mask);
        notify(observer, Checkpoint::Glyphs, StageImage::Gray(&cleaned));

        let glyphs: Vec<GlyphSegment> = Components::extract(&cleaned)
            .sorted_by_left()
            .into_iter()
            .map(|bounds| {
                let raster =
                    imageops::crop_imm(&cleaned, bounds.x, bounds.y, bounds.width, bounds.height)
                        .to_image();
                notify(
                    observer,
                    Checkpoint::Glyph { left_x: bounds.x },
                    StageImage::Gray(&raster),
                );
                GlyphSegment {
                    raster,
                    left_x: bounds.x,
                    right_x: bounds.right(),
                }
            })
            .collect();

        let spans: Vec<(u32, u32)> = glyphs.iter().map(|g| (g.left_x, g.right_x)).collect();
        let gap = section_gap(&spans);

        let elapsed = started.elapsed();
        telemetry::metrics::SEGMENTATION_DURATION.observe(elapsed.as_secs_f64());
        telemetry::metrics::SEGMENTATION_GLYPHS.inc_by(glyphs.len() as u64);
        tracing::debug!(
            width = plate.width(),
            height = plate.height(),
            candidates = candidates.len(),
            glyphs = glyphs.len(),
            section_gap = ?gap,
            elapsed_ms = elapsed.as_millis() as u64,
            "segmented plate"
        );

        Ok(Segmentation {
            glyphs,
            section_gap: gap,
        })
    }
}

fn notify(observer: &mut dyn SegmentationObserver, checkpoint: Checkpoint, image: StageImage<'_>) {
    if let Err(e) = observer.observe(checkpoint, image) {
        tracing::warn!(checkpoint = %checkpoint, error = %e, "segmentation observer failed");
    }
}
