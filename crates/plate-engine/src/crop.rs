use common::{Detection, Rect};
use image::{imageops, RgbImage};

use crate::resolver::Resolution;

/// A plate detection together with its pixels
#[derive(Debug, Clone)]
pub struct PlateCrop {
    pub detection: Detection,
    pub image: RgbImage,
}

/// Pixel crops for one resolver entry; `vehicle` is `None` for the trailing
/// unassigned bucket
#[derive(Debug, Clone)]
pub struct CroppedEntry<'r> {
    pub vehicle: Option<&'r Detection>,
    pub vehicle_image: Option<RgbImage>,
    pub plates: Vec<PlateCrop>,

    /// Plates of this entry whose box lies entirely outside the image
    pub plates_outside: usize,
}

/// Crop every vehicle and plate of `resolution` out of `image`.
///
/// Entries follow [`Resolution::entries`]. Boxes entirely outside the image
/// are skipped with a warning; a vehicle whose box is skipped still keeps its
/// plates.
pub fn crop_resolution<'r>(image: &RgbImage, resolution: &'r Resolution) -> Vec<CroppedEntry<'r>> {
    resolution
        .entries()
        .map(|(vehicle, plates)| {
            let vehicle_image = vehicle.and_then(|v| {
                let crop = crop_region(image, &v.bbox);
                if crop.is_none() {
                    tracing::warn!(bbox = ?v.bbox, "vehicle box outside image, skipping crop");
                }
                crop
            });
            let crops: Vec<PlateCrop> = plates
                .iter()
                .filter_map(|plate| {
                    let crop = crop_region(image, &plate.bbox);
                    if crop.is_none() {
                        tracing::warn!(bbox = ?plate.bbox, "plate box outside image, skipping crop");
                    }
                    crop.map(|image| PlateCrop {
                        detection: *plate,
                        image,
                    })
                })
                .collect();
            CroppedEntry {
                vehicle,
                vehicle_image,
                plates_outside: plates.len() - crops.len(),
                plates: crops,
            }
        })
        .collect()
}

/// Cut `bbox` out of `image`, clipped to the image bounds.
///
/// Returns `None` when the box lies entirely outside the image.
pub fn crop_region(image: &RgbImage, bbox: &Rect) -> Option<RgbImage> {
    let clipped = bbox.clamp_to(image.width(), image.height())?;

    // clamp_to guarantees non-negative, in-bounds, non-empty edges
    let x = clipped.left() as u32;
    let y = clipped.top() as u32;
    let width = clipped.width() as u32;
    let height = clipped.height() as u32;

    Some(imageops::crop_imm(image, x, y, width, height).to_image())
}
