//! Plate shaped region proposals.
//!
//! Edges, then every contour of the edge map, then a polygon approximation of
//! each contour. Quadrilaterals whose bounding box has a plate like aspect
//! ratio survive. Nothing is ranked or merged, so nested and overlapping
//! boxes (the outer and the hole border of the same edge loop, typically)
//! are all returned in contour traversal order.

use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::edges::canny;
use imageproc::geometry::{ approximate_polygon_dp, arc_length };
use imageproc::point::Point;
use serde::Serialize;
use tracing::debug;

use crate::config::DetectConfig;

/// Axis aligned rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {

    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32/self.height as f32
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }

    /// Grow by `margin` on every side without leaving a `width`×`height` frame.
    pub fn expand_clamped(&self, margin: u32, width: u32, height: u32) -> Self {
        let x1 = self.x.saturating_sub(margin);
        let y1 = self.y.saturating_sub(margin);
        let x2 = self.right().saturating_add(margin).min(width);
        let y2 = self.bottom().saturating_add(margin).min(height);
        Self::new(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1))
    }

    /// The centred region covering `fraction` of each dimension.
    pub fn centered(width: u32, height: u32, fraction: f32) -> Self {
        let fraction = fraction.max(0.0).min(1.0);
        let w = ((width as f32*fraction).round() as u32).max(1).min(width);
        let h = ((height as f32*fraction).round() as u32).max(1).min(height);
        Self::new((width - w)/2, (height - h)/2, w, h)
    }
}

#[derive(Debug, Clone)]
pub struct CandidateDetector {
    config: DetectConfig,
}

impl CandidateDetector {

    pub fn new(config: DetectConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, img: &GrayImage) -> Vec<Region> {
        let config = &self.config;
        let (width, height) = img.dimensions();
        let edges = canny(img, config.canny_low, config.canny_high);
        let contours = find_contours::<i32>(&edges);

        let candidates: Vec<Region> = contours.iter().filter_map(|contour| {
            let points = &contour.points;
            // a quadrilateral needs at least four distinct points
            if points.len() < 4 {
                return None;
            }
            let perimeter = arc_length(points, true);
            if perimeter <= 0.0 {
                return None;
            }
            let approx = approximate_polygon_dp(points, config.epsilon_ratio*perimeter, true);
            if approx.len() != 4 {
                return None;
            }
            let region = bounding_rect(&approx);
            if region.fits_in(width, height) && self.is_plate_shaped(&region) {
                Some(region)
            } else {
                None
            }
        }).collect();

        debug!(contours = contours.len(), candidates = candidates.len(), "candidate detection");
        candidates
    }

    pub fn is_plate_shaped(&self, region: &Region) -> bool {
        if region.height == 0 {
            return false;
        }
        let ratio = region.aspect_ratio();
        self.config.min_aspect <= ratio && ratio <= self.config.max_aspect
            && region.width > self.config.min_width
    }
}

/// Smallest upright rectangle holding every point, edges inclusive.
pub fn bounding_rect(points: &[Point<i32>]) -> Region {
    let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
    let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    if points.is_empty() {
        return Region::new(0, 0, 0, 0);
    }
    let min_x = min_x.max(0);
    let min_y = min_y.max(0);
    Region::new(min_x as u32, min_y as u32, (max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32)
}


#[cfg(test)]
mod test {

    use image::{ GrayImage, Luma };
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::point::Point;
    use imageproc::rect::Rect;

    use super::*;

    fn detector() -> CandidateDetector {
        CandidateDetector::new(DetectConfig::default())
    }

    #[test]
    fn black_image_has_no_candidates() {
        let img = GrayImage::new(320, 240);
        assert!(detector().detect(&img).is_empty());
    }

    #[test]
    fn finds_plate_shaped_rectangle() {
        let mut img = GrayImage::new(400, 200);
        draw_filled_rect_mut(&mut img, Rect::at(100, 70).of_size(200, 60), Luma([255]));
        let candidates = detector().detect(&img);
        assert!(!candidates.is_empty());
        for c in &candidates {
            let ratio = c.aspect_ratio();
            assert!((2.0..=5.0).contains(&ratio), "ratio {}", ratio);
            assert!(c.width >= 100);
            assert!(c.fits_in(400, 200));
            // every proposal hugs the drawn rectangle
            assert!(c.x >= 95 && c.x <= 105, "{:?}", c);
            assert!(c.y >= 65 && c.y <= 75, "{:?}", c);
        }
    }

    #[test]
    fn square_and_small_boxes_are_rejected() {
        let mut img = GrayImage::new(400, 300);
        draw_filled_rect_mut(&mut img, Rect::at(40, 40).of_size(120, 120), Luma([255]));
        draw_filled_rect_mut(&mut img, Rect::at(250, 200).of_size(60, 20), Luma([255]));
        assert!(detector().detect(&img).is_empty());
    }

    #[test]
    fn shape_filter_bounds() {
        let d = detector();
        assert!(d.is_plate_shaped(&Region::new(0, 0, 200, 100)));
        assert!(d.is_plate_shaped(&Region::new(0, 0, 250, 50)));
        assert!(!d.is_plate_shaped(&Region::new(0, 0, 100, 40)));
        assert!(!d.is_plate_shaped(&Region::new(0, 0, 300, 50)));
        assert!(!d.is_plate_shaped(&Region::new(0, 0, 150, 0)));
    }

    #[test]
    fn bounding_rect_is_inclusive() {
        let pts = [Point::new(10, 5), Point::new(30, 5), Point::new(30, 15), Point::new(10, 15)];
        assert_eq!(bounding_rect(&pts), Region::new(10, 5, 21, 11));
    }

    #[test]
    fn margin_is_clamped_to_frame() {
        let r = Region::new(2, 3, 100, 30).expand_clamped(5, 104, 200);
        assert_eq!(r, Region::new(0, 0, 104, 38));
        assert!(r.fits_in(104, 200));
    }

    #[test]
    fn centered_crop() {
        assert_eq!(Region::centered(400, 100, 0.5), Region::new(100, 25, 200, 50));
        assert_eq!(Region::centered(10, 10, 1.0), Region::new(0, 0, 10, 10));
    }
}
