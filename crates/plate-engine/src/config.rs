use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::normalizer::NormalizerConfig;
use crate::resolver::ResolverConfig;
use crate::segmentation::SegmentationConfig;

/// Tunables for the whole reading pipeline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

impl EngineConfig {
    /// Parse from JSON; `null` yields the defaults
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let config: Self = if value.is_null() {
            Self::default()
        } else {
            serde_json::from_value(value).context("Failed to parse engine config")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `PLATE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        override_from(&lookup, "PLATE_IOA_THRESHOLD", &mut config.resolver.plate_vehicle_ioa_threshold)?;
        override_from(&lookup, "PLATE_BLUR_KERNEL", &mut config.segmentation.blur_kernel_size)?;
        override_from(
            &lookup,
            "PLATE_CHANNEL_DIFF_THRESHOLD",
            &mut config.segmentation.channel_diff_threshold,
        )?;
        override_from(
            &lookup,
            "PLATE_ADAPTIVE_BLOCK_SIZE",
            &mut config.segmentation.adaptive_block_size,
        )?;
        override_from(&lookup, "PLATE_ADAPTIVE_OFFSET", &mut config.segmentation.adaptive_offset)?;
        override_from(&lookup, "PLATE_GLYPH_RESIZE", &mut config.normalizer.resize_target)?;
        override_from(&lookup, "PLATE_GLYPH_PAD", &mut config.normalizer.pad_target)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.resolver.validate().context("invalid resolver config")?;
        self.segmentation
            .validate()
            .context("invalid segmentation config")?;
        self.normalizer.validate().context("invalid normalizer config")?;
        Ok(())
    }

    /// JSON Schema describing the configuration knobs
    pub fn config_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "resolver": {
                    "type": "object",
                    "properties": {
                        "plate_vehicle_ioa_threshold": {
                            "type": "number",
                            "minimum": 0.0,
                            "maximum": 1.0,
                            "default": 0.85,
                            "description": "Share of a plate's area that must lie inside a vehicle box for the plate to belong to it"
                        }
                    }
                },
                "segmentation": {
                    "type": "object",
                    "properties": {
                        "blur_kernel_size": {
                            "type": "integer",
                            "minimum": 1,
                            "default": 5,
                            "description": "Gaussian blur kernel side (odd)"
                        },
                        "channel_diff_threshold": {
                            "type": "integer",
                            "minimum": 0,
                            "maximum": 255,
                            "default": 40,
                            "description": "Blue/red difference above which a pixel belongs to the colored side band"
                        },
                        "adaptive_block_size": {
                            "type": "integer",
                            "minimum": 3,
                            "default": 61,
                            "description": "Neighbourhood size of the local threshold (odd)"
                        },
                        "adaptive_offset": {
                            "type": "number",
                            "default": 15.0,
                            "description": "Constant subtracted from the local weighted mean"
                        },
                        "min_char_height_factor": {
                            "type": "number",
                            "minimum": 0.0,
                            "maximum": 1.0,
                            "default": 0.4,
                            "description": "Minimum glyph height as a fraction of plate height"
                        },
                        "max_char_height_factor": {
                            "type": "number",
                            "minimum": 0.0,
                            "maximum": 1.0,
                            "default": 0.9,
                            "description": "Maximum glyph height as a fraction of plate height"
                        },
                        "min_char_aspect": {
                            "type": "number",
                            "default": 1.0,
                            "description": "Minimum glyph height/width ratio"
                        },
                        "max_char_aspect": {
                            "type": "number",
                            "default": 10.0,
                            "description": "Maximum glyph height/width ratio"
                        },
                        "min_char_width_factor": {
                            "type": "number",
                            "minimum": 0.0,
                            "maximum": 1.0,
                            "default": 0.015,
                            "description": "Minimum glyph width as a fraction of plate width"
                        },
                        "max_char_width_factor": {
                            "type": "number",
                            "minimum": 0.0,
                            "maximum": 1.0,
                            "default": 0.18,
                            "description": "Maximum glyph width as a fraction of plate width"
                        }
                    }
                },
                "normalizer": {
                    "type": "object",
                    "properties": {
                        "resize_target": {
                            "type": "integer",
                            "minimum": 1,
                            "default": 216,
                            "description": "Longer glyph side after scaling"
                        },
                        "pad_target": {
                            "type": "integer",
                            "minimum": 1,
                            "default": 256,
                            "description": "Side of the square classifier input"
                        }
                    }
                }
            }
        })
    }
}

fn override_from<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: '{}'", key, raw))?;
    }
    Ok(())
}
