pub mod mock;

use anyhow::Result;
use common::RawDetection;
use image::{GrayImage, RgbImage};
use ndarray::Array1;

/// Object detector producing vehicle and plate boxes for a full image.
///
/// Confidence and overlap filtering are the detector's responsibility; the
/// engine consumes whatever boxes are returned.
pub trait PlateDetector: Send + Sync {
    /// Unique detector identifier (e.g., "yolov8_plates")
    fn id(&self) -> &'static str;

    fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>>;
}

/// Character classifier scoring one normalized glyph.
///
/// Returns one score per symbol of the plate alphabet, in alphabet order.
pub trait CharacterClassifier: Send + Sync {
    /// Unique classifier identifier (e.g., "plate_chars_cnn")
    fn id(&self) -> &'static str;

    fn classify(&self, glyph: &GrayImage) -> Result<Array1<f32>>;
}
