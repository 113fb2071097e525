//! Plate binarization: blur, side-band masking and local adaptive threshold.

use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;

const RED: usize = 0;
const BLUE: usize = 2;

/// Gaussian sigma for a square kernel of side `kernel_size`, using the
/// common `0.3 * ((k - 1) * 0.5 - 1) + 0.8` rule.
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Low-pass blur. A kernel of 1 leaves the image untouched.
pub fn blur(image: &RgbImage, kernel_size: u32) -> RgbImage {
    if kernel_size <= 1 {
        return image.clone();
    }
    gaussian_blur_f32(image, sigma_for_kernel(kernel_size))
}

/// Single channel of an RGB image as grayscale
pub fn channel(image: &RgbImage, index: usize) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y).0[index]])
    })
}

pub fn blue_channel(image: &RgbImage) -> GrayImage {
    channel(image, BLUE)
}

pub fn red_channel(image: &RgbImage) -> GrayImage {
    channel(image, RED)
}

/// `|blue - red|` per pixel
pub fn channel_difference(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let rgb = image.get_pixel(x, y).0;
        Luma([rgb[BLUE].abs_diff(rgb[RED])])
    })
}

/// Keep-mask: on wherever the blue/red difference is at most `threshold`.
///
/// The colored side band on the left of the plate has a large difference and
/// is switched off.
pub fn band_mask(difference: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(difference.width(), difference.height(), |x, y| {
        if difference.get_pixel(x, y).0[0] > threshold {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

/// HSV value channel: `max(R, G, B)`
pub fn value_channel(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Luma([r.max(g).max(b)])
    })
}

/// Per-pixel threshold surface of a Gaussian-weighted local threshold.
///
/// The neighbourhood weight has `sigma = (block_size - 1) / 6`; the threshold
/// is the weighted mean minus `offset`. Values are kept signed since the
/// surface may dip below zero in dark regions.
pub fn local_threshold(value: &GrayImage, block_size: u32, offset: f32) -> Vec<f32> {
    let sigma = (block_size as f32 - 1.0) / 6.0;
    let mean = if sigma > 0.0 {
        gaussian_blur_f32(value, sigma)
    } else {
        value.clone()
    };
    mean.pixels().map(|p| f32::from(p.0[0]) - offset).collect()
}

/// Foreground mask of dark strokes: on where `value <= threshold`
pub fn dark_foreground(value: &GrayImage, threshold: &[f32]) -> GrayImage {
    let width = value.width();
    GrayImage::from_fn(width, value.height(), |x, y| {
        let idx = (y * width + x) as usize;
        let t = threshold.get(idx).copied().unwrap_or(f32::NEG_INFINITY);
        if f32::from(value.get_pixel(x, y).0[0]) <= t {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Render a threshold surface as an 8-bit image for diagnostics
pub fn threshold_image(width: u32, height: u32, threshold: &[f32]) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let t = threshold
            .get((y * width + x) as usize)
            .copied()
            .unwrap_or(0.0);
        Luma([t.round().clamp(0.0, 255.0) as u8])
    })
}

/// Pixel-wise AND of two binary masks of equal size
pub fn mask_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let on = a.get_pixel(x, y).0[0] > 0
            && b.get_pixel_checked(x, y).is_some_and(|p| p.0[0] > 0);
        Luma([if on { 255 } else { 0 }])
    })
}
