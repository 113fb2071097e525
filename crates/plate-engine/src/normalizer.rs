use anyhow::{bail, Context, Result};
use common::validation;
use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Longer side of the glyph after scaling
    #[serde(default = "default_resize_target")]
    pub resize_target: u32,

    /// Side of the square output canvas
    #[serde(default = "default_pad_target")]
    pub pad_target: u32,
}

fn default_resize_target() -> u32 {
    216
}

fn default_pad_target() -> u32 {
    256
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            resize_target: default_resize_target(),
            pad_target: default_pad_target(),
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<()> {
        validation::validate_range(self.resize_target, 1, validation::MAX_RASTER_SIDE, "resize_target")?;
        validation::validate_range(self.pad_target, 1, validation::MAX_RASTER_SIDE, "pad_target")?;
        if self.resize_target > self.pad_target {
            bail!(
                "resize_target ({}) must not exceed pad_target ({})",
                self.resize_target,
                self.pad_target
            );
        }
        Ok(())
    }
}

/// Brings glyph rasters to the fixed square input of the character classifier
#[derive(Debug, Clone)]
pub struct GlyphNormalizer {
    config: NormalizerConfig,
}

impl GlyphNormalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        config.validate().context("invalid normalizer config")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Scale `glyph` so its longer side equals the resize target, then center
    /// it on a black `pad_target` square.
    pub fn normalize(&self, glyph: &GrayImage) -> Result<GrayImage> {
        validation::validate_dimensions(glyph.width(), glyph.height(), "glyph")?;

        let scaled = self.scale(glyph);
        let pad = self.config.pad_target;
        let left = (pad - scaled.width()) / 2;
        let top = (pad - scaled.height()) / 2;

        let mut canvas = GrayImage::new(pad, pad);
        imageops::replace(&mut canvas, &scaled, i64::from(left), i64::from(top));
        Ok(canvas)
    }

    fn scale(&self, glyph: &GrayImage) -> GrayImage {
        let (width, height) = glyph.dimensions();
        let target = self.config.resize_target;
        let longer = width.max(height);
        if longer == target {
            return glyph.clone();
        }

        let ratio = f64::from(target) / f64::from(longer);
        let scaled_side = |side: u32| ((f64::from(side) * ratio).round() as u32).clamp(1, target);
        let (new_width, new_height) = (scaled_side(width), scaled_side(height));

        if longer < target {
            imageops::resize(glyph, new_width, new_height, FilterType::CatmullRom)
        } else {
            imageops::thumbnail(glyph, new_width, new_height)
        }
    }
}
