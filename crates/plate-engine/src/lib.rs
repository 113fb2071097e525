pub mod config;
pub mod corrector;
pub mod crop;
pub mod normalizer;
pub mod plugin;
pub mod reader;
pub mod resolver;
pub mod segmentation;

pub use config::EngineConfig;
pub use corrector::{CorrectedText, GlyphPrediction, RecognitionCorrector, Substitution};
pub use normalizer::{GlyphNormalizer, NormalizerConfig};
pub use plugin::{CharacterClassifier, PlateDetector};
pub use reader::{ImageOutcome, ImageReading, PlateReader, PlateReading, VehicleReading};
pub use resolver::{DetectionResolver, Resolution, ResolverConfig, VehicleAssignment};
pub use segmentation::{GlyphSegment, PlateSegmenter, Segmentation, SegmentationConfig};
