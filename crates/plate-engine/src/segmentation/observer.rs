//! Diagnostic hooks into the segmentation pipeline.
//!
//! The segmenter reports every intermediate raster to a
//! [`SegmentationObserver`]. Observers never influence the result; a failing
//! observer is logged and ignored.

use anyhow::{Context, Result};
use image::{GrayImage, RgbImage};
use std::fmt;
use std::path::{Path, PathBuf};

/// Fixed points in the segmentation pipeline where intermediates are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    Original,
    Blurred,
    Blue,
    Red,
    ChannelDiff,
    BandMask,
    Value,
    Threshold,
    Binary,
    GlyphMask,
    Glyphs,
    /// One isolated glyph, keyed by its left edge on the plate
    Glyph { left_x: u32 },
}

impl Checkpoint {
    /// File name used when dumping this checkpoint to disk
    pub fn file_name(&self) -> String {
        match self {
            Self::Original => "0_original.png".to_string(),
            Self::Blurred => "1_blurred.png".to_string(),
            Self::Blue => "2_blue.png".to_string(),
            Self::Red => "3_red.png".to_string(),
            Self::ChannelDiff => "4_channel_diff.png".to_string(),
            Self::BandMask => "5_band_mask.png".to_string(),
            Self::Value => "6_value.png".to_string(),
            Self::Threshold => "7_threshold.png".to_string(),
            Self::Binary => "8_binary.png".to_string(),
            Self::GlyphMask => "9_glyph_mask.png".to_string(),
            Self::Glyphs => "10_glyphs.png".to_string(),
            Self::Glyph { left_x } => format!("glyph_{}.png", left_x),
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glyph { left_x } => write!(f, "glyph@{}", left_x),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Borrowed view of an intermediate raster
#[derive(Debug, Clone, Copy)]
pub enum StageImage<'a> {
    Rgb(&'a RgbImage),
    Gray(&'a GrayImage),
}

impl StageImage<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Rgb(image) => image.dimensions(),
            Self::Gray(image) => image.dimensions(),
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        match self {
            Self::Rgb(image) => image.save(path),
            Self::Gray(image) => image.save(path),
        }
        .with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Receives intermediate rasters from the segmenter
pub trait SegmentationObserver {
    /// Whether the observer wants images at all. The segmenter skips
    /// building diagnostic-only rasters when this is false.
    fn enabled(&self) -> bool {
        true
    }

    fn observe(&mut self, checkpoint: Checkpoint, image: StageImage<'_>) -> Result<()>;
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SegmentationObserver for NoopObserver {
    fn enabled(&self) -> bool {
        false
    }

    fn observe(&mut self, _checkpoint: Checkpoint, _image: StageImage<'_>) -> Result<()> {
        Ok(())
    }
}

/// Owned copy of an observed raster
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedImage {
    Rgb(RgbImage),
    Gray(GrayImage),
}

impl RecordedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Rgb(image) => image.dimensions(),
            Self::Gray(image) => image.dimensions(),
        }
    }

    pub fn as_gray(&self) -> Option<&GrayImage> {
        match self {
            Self::Gray(image) => Some(image),
            Self::Rgb(_) => None,
        }
    }
}

/// Keeps every observed raster in memory, in checkpoint order
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    stages: Vec<(Checkpoint, RecordedImage)>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> &[(Checkpoint, RecordedImage)] {
        &self.stages
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.stages.iter().map(|(checkpoint, _)| *checkpoint).collect()
    }

    pub fn get(&self, checkpoint: Checkpoint) -> Option<&RecordedImage> {
        self.stages
            .iter()
            .find(|(seen, _)| *seen == checkpoint)
            .map(|(_, image)| image)
    }
}

impl SegmentationObserver for RecordingObserver {
    fn observe(&mut self, checkpoint: Checkpoint, image: StageImage<'_>) -> Result<()> {
        let recorded = match image {
            StageImage::Rgb(image) => RecordedImage::Rgb(image.clone()),
            StageImage::Gray(image) => RecordedImage::Gray(image.clone()),
        };
        self.stages.push((checkpoint, recorded));
        Ok(())
    }
}

/// Writes each checkpoint as a PNG into a directory
#[derive(Debug, Clone)]
pub struct DirectoryDump {
    dir: PathBuf,
    written: usize,
}

impl DirectoryDump {
    /// Create the dump, creating `dir` if it does not exist
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create debug directory {}", dir.display()))?;
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files written so far
    pub fn written(&self) -> usize {
        self.written
    }
}

impl SegmentationObserver for DirectoryDump {
    fn observe(&mut self, checkpoint: Checkpoint, image: StageImage<'_>) -> Result<()> {
        let path = self.dir.join(checkpoint.file_name());
        image.save(&path)?;
        self.written += 1;
        tracing::trace!(checkpoint = %checkpoint, path = %path.display(), "wrote debug image");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_checkpoint_file_names() {
        assert_eq!(Checkpoint::Original.file_name(), "0_original.png");
        assert_eq!(Checkpoint::BandMask.file_name(), "5_band_mask.png");
        assert_eq!(Checkpoint::Glyphs.file_name(), "10_glyphs.png");
        assert_eq!(Checkpoint::Glyph { left_x: 42 }.file_name(), "glyph_42.png");
    }

    #[test]
    fn test_recording_observer_keeps_order() {
        let mut observer = RecordingObserver::new();
        let gray = GrayImage::from_pixel(4, 2, Luma([9]));
        observer.observe(Checkpoint::Value, StageImage::Gray(&gray)).unwrap();
        observer.observe(Checkpoint::Binary, StageImage::Gray(&gray)).unwrap();

        assert_eq!(observer.checkpoints(), vec![Checkpoint::Value, Checkpoint::Binary]);
        assert_eq!(observer.get(Checkpoint::Binary).unwrap().dimensions(), (4, 2));
        assert!(observer.get(Checkpoint::Original).is_none());
    }

    #[test]
    fn test_directory_dump_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut dump = DirectoryDump::new(dir.path().join("stages")).unwrap();
        let gray = GrayImage::from_pixel(3, 3, Luma([255]));

        dump.observe(Checkpoint::Glyph { left_x: 7 }, StageImage::Gray(&gray)).unwrap();

        let written = dir.path().join("stages").join("glyph_7.png");
        assert!(written.exists());
        assert_eq!(dump.written(), 1);
        assert_eq!(image::open(written).unwrap().to_luma8(), gray);
    }

    #[test]
    fn test_noop_observer_is_disabled() {
        assert!(!NoopObserver.enabled());
        assert!(RecordingObserver::new().enabled());
    }
}
