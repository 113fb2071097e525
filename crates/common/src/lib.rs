pub mod alphabet;
pub mod detections;
pub mod geometry;
pub mod validation;

pub use alphabet::{Alphabet, ForbiddenSet, ScoreVector};
pub use detections::{Detection, DetectionClass, RawDetection};
pub use geometry::{intersection_area, ioa, Rect};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
