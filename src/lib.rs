//! License plate reading: detection resolution, glyph segmentation and
//! recognition post-correction.
//!
//! The workspace crates are re-exported here so integration tests and
//! downstream users can depend on a single package.

pub use common;
pub use plate_engine as engine;
pub use telemetry;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
