//! Detector output contracts.
//!
//! Upstream detectors report integer class ids; they are mapped to
//! [`DetectionClass`] once at ingestion so nothing downstream compares
//! magic numbers.

use crate::geometry::Rect;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Detector class id reserved for vehicles. Every other id is a plate.
pub const VEHICLE_CLASS_ID: u32 = 0;

/// Object class of a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    /// Whole vehicle
    Vehicle,

    /// License plate
    Plate,
}

impl DetectionClass {
    /// Map a raw detector class id
    pub fn from_class_id(class_id: u32) -> Self {
        if class_id == VEHICLE_CLASS_ID {
            Self::Vehicle
        } else {
            Self::Plate
        }
    }
}

/// A detection exactly as reported by the upstream model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Detector class id (0 = vehicle, anything else = plate)
    pub class_id: u32,

    /// Detector confidence in `[0, 1]`
    pub confidence: f32,

    /// Box corners `[x1, y1, x2, y2]` in pixels
    pub xyxy: [f32; 4],
}

/// A validated detection with a typed class and integer box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: DetectionClass,
    pub bbox: Rect,
    pub confidence: f32,
}

impl Detection {
    pub fn new(class: DetectionClass, bbox: Rect, confidence: f32) -> Self {
        Self {
            class,
            bbox,
            confidence,
        }
    }

    pub fn vehicle(bbox: Rect, confidence: f32) -> Self {
        Self::new(DetectionClass::Vehicle, bbox, confidence)
    }

    pub fn plate(bbox: Rect, confidence: f32) -> Self {
        Self::new(DetectionClass::Plate, bbox, confidence)
    }

    pub fn is_vehicle(&self) -> bool {
        self.class == DetectionClass::Vehicle
    }

    pub fn is_plate(&self) -> bool {
        self.class == DetectionClass::Plate
    }
}

impl TryFrom<&RawDetection> for Detection {
    type Error = anyhow::Error;

    /// Coordinates are truncated toward zero, matching how the detector's
    /// float boxes are turned into pixel crops.
    fn try_from(raw: &RawDetection) -> Result<Self> {
        if raw.xyxy.iter().any(|c| !c.is_finite()) {
            return Err(anyhow!("detection box has non-finite coordinates: {:?}", raw.xyxy));
        }

        let [x1, y1, x2, y2] = raw.xyxy.map(|c| c as i32);
        let bbox = Rect::new(x1, y1, x2, y2)
            .with_context(|| format!("invalid box for class id {}", raw.class_id))?;

        Ok(Self::new(
            DetectionClass::from_class_id(raw.class_id),
            bbox,
            raw.confidence,
        ))
    }
}
