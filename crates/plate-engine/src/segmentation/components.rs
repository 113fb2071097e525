//! Connected-component extraction, glyph shape filters and section gap search.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::BTreeMap;

use super::SegmentationConfig;

/// Bounding box of one connected component; right/bottom are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ComponentBounds {
    fn seed(x: u32, y: u32) -> Self {
        Self {
            x,
            y,
            width: 1,
            height: 1,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        let right = self.right().max(x + 1);
        let bottom = self.bottom().max(y + 1);
        self.x = self.x.min(x);
        self.y = self.y.min(y);
        self.width = right - self.x;
        self.height = bottom - self.y;
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Labelled foreground of a binary image
pub struct Components {
    labels: ImageBuffer<Luma<u32>, Vec<u32>>,
    bounds: BTreeMap<u32, ComponentBounds>,
}

impl Components {
    /// Label 8-connected foreground regions (any non-zero pixel)
    pub fn extract(binary: &GrayImage) -> Self {
        let labels = connected_components(binary, Connectivity::Eight, Luma([0u8]));

        let mut bounds: BTreeMap<u32, ComponentBounds> = BTreeMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0];
            if label == 0 {
                continue;
            }
            bounds
                .entry(label)
                .and_modify(|b| b.include(x, y))
                .or_insert_with(|| ComponentBounds::seed(x, y));
        }

        Self { labels, bounds }
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// `(label, bounds)` pairs in label order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ComponentBounds)> + '_ {
        self.bounds.iter().map(|(label, bounds)| (*label, bounds))
    }

    /// Bounds sorted by left edge; ties keep label order
    pub fn sorted_by_left(&self) -> Vec<ComponentBounds> {
        let mut sorted: Vec<ComponentBounds> = self.bounds.values().copied().collect();
        sorted.sort_by_key(|b| b.x);
        sorted
    }

    /// Mask with the pixels of every component `keep` accepts switched on
    pub fn paint<F>(&self, mut keep: F) -> GrayImage
    where
        F: FnMut(&ComponentBounds) -> bool,
    {
        let accepted: Vec<u32> = self
            .bounds
            .iter()
            .filter(|(_, bounds)| keep(bounds))
            .map(|(label, _)| *label)
            .collect();

        GrayImage::from_fn(self.labels.width(), self.labels.height(), |x, y| {
            let label = self.labels.get_pixel(x, y).0[0];
            if label != 0 && accepted.binary_search(&label).is_ok() {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }
}

/// Plate-relative size and shape limits for a glyph component
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphFilter {
    plate_width: u32,
    plate_height: u32,
    min_height: f32,
    max_height: f32,
    min_aspect: f32,
    max_aspect: f32,
    min_width: f32,
    max_width: f32,
}

impl GlyphFilter {
    pub fn for_plate(config: &SegmentationConfig, plate_width: u32, plate_height: u32) -> Self {
        let lw = plate_width as f32;
        let lh = plate_height as f32;
        Self {
            plate_width,
            plate_height,
            min_height: config.min_char_height_factor * lh,
            max_height: config.max_char_height_factor * lh,
            min_aspect: config.min_char_aspect,
            max_aspect: config.max_char_aspect,
            min_width: config.min_char_width_factor * lw,
            max_width: config.max_char_width_factor * lw,
        }
    }

    /// Within 1 px of any plate edge
    pub fn touches_border(&self, bounds: &ComponentBounds) -> bool {
        bounds.x <= 1
            || bounds.y <= 1
            || self.plate_width.abs_diff(bounds.right()) <= 1
            || self.plate_height.abs_diff(bounds.bottom()) <= 1
    }

    pub fn accepts(&self, bounds: &ComponentBounds) -> bool {
        let height = bounds.height as f32;
        let width = bounds.width as f32;
        let aspect = height / width;

        (self.min_height..=self.max_height).contains(&height)
            && (self.min_aspect..=self.max_aspect).contains(&aspect)
            && (self.min_width..=self.max_width).contains(&width)
            && !self.touches_border(bounds)
    }
}

/// Index of the glyph that follows the widest gap between neighbours.
///
/// `spans` are `(left, right)` edges in reading order. The gap before glyph
/// `i` is `left[i] - right[i - 1]`. Returns `None` when there are fewer than
/// two glyphs, no gap is positive, or the widest gap is not unique.
pub fn section_gap(spans: &[(u32, u32)]) -> Option<usize> {
    let mut widest: Option<(usize, i64)> = None;
    let mut tied = false;

    for i in 1..spans.len() {
        let gap = i64::from(spans[i].0) - i64::from(spans[i - 1].1);
        if gap <= 0 {
            continue;
        }
        match widest {
            Some((_, best)) if gap < best => {}
            Some((_, best)) if gap == best => tied = true,
            _ => {
                widest = Some((i, gap));
                tied = false;
            }
        }
    }

    if tied {
        return None;
    }
    widest.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_boxes(width: u32, height: u32, boxes: &[(u32, u32, u32, u32)]) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let on = boxes
                .iter()
                .any(|&(bx, by, bw, bh)| x >= bx && x < bx + bw && y >= by && y < by + bh);
            Luma([if on { 255 } else { 0 }])
        })
    }

    #[test]
    fn test_component_bounds() {
        let image = image_with_boxes(50, 20, &[(5, 3, 4, 10), (20, 2, 6, 12)]);
        let components = Components::extract(&image);

        assert_eq!(components.len(), 2);
        let sorted = components.sorted_by_left();
        assert_eq!(
            sorted[0],
            ComponentBounds {
                x: 5,
                y: 3,
                width: 4,
                height: 10
            }
        );
        assert_eq!(sorted[1].right(), 26);
        assert_eq!(sorted[1].bottom(), 14);
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let image = GrayImage::from_fn(4, 4, |x, y| Luma([if x == y { 255 } else { 0 }]));
        assert_eq!(Components::extract(&image).len(), 1);
    }

    #[test]
    fn test_paint_keeps_only_accepted_components() {
        let image = image_with_boxes(50, 20, &[(5, 3, 4, 10), (20, 2, 6, 12)]);
        let components = Components::extract(&image);
        let mask = components.paint(|b| b.x > 10);

        assert_eq!(mask.get_pixel(6, 5).0[0], 0);
        assert_eq!(mask.get_pixel(22, 5).0[0], 255);
    }

    #[test]
    fn test_glyph_filter() {
        let config = SegmentationConfig::default();
        // 200x50 plate: height 20..=45, width 3..=36
        let filter = GlyphFilter::for_plate(&config, 200, 50);

        let glyph = ComponentBounds {
            x: 30,
            y: 8,
            width: 15,
            height: 34,
        };
        assert!(filter.accepts(&glyph));

        let too_short = ComponentBounds { height: 10, ..glyph };
        assert!(!filter.accepts(&too_short));

        let too_wide = ComponentBounds {
            width: 40,
            height: 38,
            ..glyph
        };
        assert!(!filter.accepts(&too_wide));

        let flat = ComponentBounds {
            width: 30,
            height: 25,
            ..glyph
        };
        assert!(!filter.accepts(&flat));

        let at_left_edge = ComponentBounds { x: 1, ..glyph };
        assert!(!filter.accepts(&at_left_edge));

        let at_bottom_edge = ComponentBounds { y: 15, ..glyph };
        assert!(filter.touches_border(&at_bottom_edge));
    }

    #[test]
    fn test_section_gap_picks_widest() {
        let spans = [(10, 20), (22, 32), (50, 60), (62, 72), (74, 84)];
        assert_eq!(section_gap(&spans), Some(2));
    }

    #[test]
    fn test_section_gap_degenerate_cases() {
        assert_eq!(section_gap(&[]), None);
        assert_eq!(section_gap(&[(0, 10)]), None);
        // Touching or overlapping glyphs have no positive gap
        assert_eq!(section_gap(&[(0, 10), (10, 20), (18, 30)]), None);
        // Two equally wide gaps
        assert_eq!(section_gap(&[(0, 10), (15, 25), (30, 40)]), None);
    }

    #[test]
    fn test_section_gap_tie_broken_by_wider_gap() {
        assert_eq!(section_gap(&[(0, 10), (15, 25), (30, 40), (60, 70)]), Some(3));
    }
}
