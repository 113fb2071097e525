//! Axis-aligned rectangle primitives shared by the detection resolver and
//! crop extraction.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates (`x1 < x2`, `y1 < y2`).
///
/// The right and bottom edges are exclusive, so `width = x2 - x1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl Rect {
    /// Build a rectangle from its left, top, right and bottom edges
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        if x1 >= x2 || y1 >= y2 {
            return Err(anyhow!(
                "degenerate rectangle ({}, {}, {}, {}): expected x1 < x2 and y1 < y2",
                x1,
                y1,
                x2,
                y2
            ));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    #[inline]
    pub fn left(&self) -> i32 {
        self.x1
    }

    #[inline]
    pub fn top(&self) -> i32 {
        self.y1
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.x2
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y2
    }

    #[inline]
    pub fn width(&self) -> i64 {
        i64::from(self.x2) - i64::from(self.x1)
    }

    #[inline]
    pub fn height(&self) -> i64 {
        i64::from(self.y2) - i64::from(self.y1)
    }

    #[inline]
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Whether the two rectangles share a region of positive area.
    /// Rectangles that only touch along an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        intersection_area(self, other) > 0
    }

    /// Clip the rectangle to `[0, width) x [0, height)`.
    ///
    /// Returns `None` when nothing of the rectangle remains inside the bounds.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);

        let x1 = self.x1.clamp(0, max_x);
        let y1 = self.y1.clamp(0, max_y);
        let x2 = self.x2.clamp(0, max_x);
        let y2 = self.y2.clamp(0, max_y);

        Rect::new(x1, y1, x2, y2).ok()
    }
}

impl TryFrom<[i32; 4]> for Rect {
    type Error = anyhow::Error;

    fn try_from(value: [i32; 4]) -> Result<Self> {
        Rect::new(value[0], value[1], value[2], value[3])
    }
}

impl From<Rect> for [i32; 4] {
    fn from(rect: Rect) -> Self {
        [rect.x1, rect.y1, rect.x2, rect.y2]
    }
}

/// Area shared by two rectangles; zero when they are disjoint or only touch.
pub fn intersection_area(a: &Rect, b: &Rect) -> i64 {
    let width = (i64::from(a.x2.min(b.x2)) - i64::from(a.x1.max(b.x1))).max(0);
    let height = (i64::from(a.y2.min(b.y2)) - i64::from(a.y1.max(b.y1))).max(0);
    width * height
}

/// Intersection over the area of `reference`.
///
/// Unlike IoU this is asymmetric: with a plate as `reference`, a plate lying
/// inside a much larger vehicle box still scores 1.0.
pub fn ioa(candidate: &Rect, reference: &Rect) -> f32 {
    intersection_area(candidate, reference) as f32 / reference.area() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x1: i32, y1: i32, x2: i32, y2: i32) -> Rect {
        Rect::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn test_rect_rejects_degenerate_boxes() {
        assert!(Rect::new(10, 10, 10, 20).is_err());
        assert!(Rect::new(10, 30, 20, 20).is_err());
        assert!(Rect::new(0, 0, 1, 1).is_ok());
    }

    #[test]
    fn test_area() {
        assert_eq!(rect(0, 0, 100, 40).area(), 4000);
        assert_eq!(rect(5, 5, 90, 35).area(), 2550);
    }

    #[test]
    fn test_intersection_area() {
        let a = rect(0, 0, 100, 40);
        let b = rect(5, 5, 90, 35);
        assert_eq!(intersection_area(&a, &b), 2550);
        assert_eq!(intersection_area(&b, &a), 2550);

        // Touching edges share no area
        let c = rect(100, 0, 150, 40);
        assert_eq!(intersection_area(&a, &c), 0);
        assert!(!a.overlaps(&c));

        // Disjoint
        let d = rect(200, 200, 250, 240);
        assert_eq!(intersection_area(&a, &d), 0);
    }

    #[test]
    fn test_ioa_uses_reference_area() {
        let vehicle = rect(0, 0, 200, 150);
        let plate = rect(60, 100, 160, 140);
        assert_eq!(intersection_area(&plate, &vehicle), 4000);
        assert!((ioa(&vehicle, &plate) - 1.0).abs() < f32::EPSILON);

        // Plate half outside the vehicle box
        let straddling = rect(150, 100, 250, 140);
        assert!((ioa(&vehicle, &straddling) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_to_bounds() {
        let r = rect(-10, -5, 50, 500);
        let clamped = r.clamp_to(40, 100).unwrap();
        assert_eq!(clamped, rect(0, 0, 40, 100));

        let outside = rect(300, 300, 400, 400);
        assert!(outside.clamp_to(100, 100).is_none());
    }

    #[test]
    fn test_rect_serde_roundtrip_validates() {
        let json = serde_json::to_value(rect(1, 2, 3, 4)).unwrap();
        assert_eq!(json, serde_json::json!([1, 2, 3, 4]));

        let bad: std::result::Result<Rect, _> = serde_json::from_value(serde_json::json!([5, 5, 1, 1]));
        assert!(bad.is_err());
    }
}
