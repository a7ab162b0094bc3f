//! Pixel-space primitives shared by the filter, the track store and the
//! crossing tests.

use num_traits::cast::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box stored by its top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from top-left corner plus width and height.
    ///
    /// Returns `None` when the far corner does not fit in pixel space.
    pub fn from_tlwh(x: i32, y: i32, width: i32, height: i32) -> Option<Self> {
        Some(Self::new(x, y, x.checked_add(width)?, y.checked_add(height)?))
    }

    /// Build from tracker output corners, truncating toward zero.
    ///
    /// Returns `None` when any coordinate is not representable as a pixel or
    /// the box extent overflows.
    pub fn from_corners_f32(x1: f32, y1: f32, x2: f32, y2: f32) -> Option<Self> {
        let bbox = Self::new(x1.to_i32()?, y1.to_i32()?, x2.to_i32()?, y2.to_i32()?);
        bbox.x2.checked_sub(bbox.x1)?;
        bbox.y2.checked_sub(bbox.y1)?;
        Some(bbox)
    }

    pub fn width(&self) -> i64 {
        i64::from(self.x2) - i64::from(self.x1)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.y2) - i64::from(self.y1)
    }

    pub fn area(&self) -> f64 {
        self.width().max(0) as f64 * self.height().max(0) as f64
    }

    /// Geometric center, rounded toward the top-left corner.
    pub fn centroid(&self) -> Point {
        Point::new(
            midpoint(self.x1, self.width()),
            midpoint(self.y1, self.height()),
        )
    }

    /// `[x1, y1, x2, y2]` as floats, the tracker's box layout.
    pub fn to_tlbr_f32(&self) -> [f32; 4] {
        [self.x1 as f32, self.y1 as f32, self.x2 as f32, self.y2 as f32]
    }
}

/// Fixed counting line for the segment-intersection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
}

impl LineSegment {
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// True when the motion segment `a`-`b` crosses this line.
    pub fn intersects(&self, a: Point, b: Point) -> bool {
        segments_intersect(a, b, self.start, self.end)
    }
}

/// Closed horizontal band `[top, bottom]` for the zone-dwell policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizontalBand {
    pub top: i32,
    pub bottom: i32,
}

impl HorizontalBand {
    pub const fn new(top: i32, bottom: i32) -> Self {
        Self { top, bottom }
    }

    pub fn contains_y(&self, y: i32) -> bool {
        self.top <= y && y <= self.bottom
    }
}

/// `start + extent / 2`; always lies between `start` and `start + extent`.
fn midpoint(start: i32, extent: i64) -> i32 {
    let mid = i64::from(start) + extent / 2;
    i32::try_from(mid).unwrap_or(start)
}

/// Whether `a`, `b`, `c` are listed in counter-clockwise order.
///
/// Collinear triples report `false`.
pub fn ccw(a: Point, b: Point, c: Point) -> bool {
    let d = |p: i32, q: i32| i128::from(p) - i128::from(q);
    let lhs = d(c.y, a.y) * d(b.x, a.x);
    let rhs = d(b.y, a.y) * d(c.x, a.x);
    lhs > rhs
}

/// Segments AB and CD intersect iff C and D lie on opposite sides of AB and
/// A and B lie on opposite sides of CD.
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    ccw(a, c, d) != ccw(b, c, d) && ccw(a, b, c) != ccw(a, b, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centroid() {
        let bbox = BoundingBox::new(80, 480, 120, 520);
        assert_eq!(bbox.centroid(), Point::new(100, 500));

        // odd extents round toward the top-left
        let bbox = BoundingBox::new(1, 1, 4, 6);
        assert_eq!(bbox.centroid(), Point::new(2, 3));
    }

    #[test]
    fn test_from_tlwh() {
        let bbox = BoundingBox::from_tlwh(10, 20, 30, 40).unwrap();
        assert_eq!(bbox, BoundingBox::new(10, 20, 40, 60));
        assert_eq!(bbox.width(), 30);
        assert_eq!(bbox.height(), 40);
        assert_relative_eq!(bbox.area(), 1200.0);
    }

    #[test]
    fn test_from_tlwh_rejects_overflowing_extent() {
        assert!(BoundingBox::from_tlwh(1_500_000_000, 0, 1_500_000_000, 10).is_none());
        assert!(BoundingBox::from_tlwh(0, i32::MAX, 10, 1).is_none());
        assert!(BoundingBox::from_tlwh(i32::MAX - 10, 0, 10, 10).is_some());
    }

    #[test]
    fn test_from_corners_f32_rejects_overflowing_extent() {
        assert!(BoundingBox::from_corners_f32(-2e9, 0.0, 2e9, 10.0).is_none());
        assert!(BoundingBox::from_corners_f32(0.0, -2e9, 10.0, 2e9).is_none());
        assert!(BoundingBox::from_corners_f32(-1e9, 0.0, 1e9, 10.0).is_some());
    }

    #[test]
    fn test_extreme_box_measures_without_overflow() {
        let bbox = BoundingBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(bbox.width(), u32::MAX as i64);
        assert_eq!(bbox.centroid(), Point::new(-1, -1));
        assert!(bbox.area() > 1.8e19);
    }

    #[test]
    fn test_from_corners_f32_truncates() {
        let bbox = BoundingBox::from_corners_f32(10.9, 20.2, 30.5, 40.99).unwrap();
        assert_eq!(bbox, BoundingBox::new(10, 20, 30, 40));
        assert!(BoundingBox::from_corners_f32(f32::NAN, 0.0, 1.0, 1.0).is_none());
    }

    #[test]
    fn test_ccw_orientation() {
        let a = Point::new(0, 0);
        let b = Point::new(10, 0);
        assert!(ccw(a, b, Point::new(5, 5)));
        assert!(!ccw(a, b, Point::new(5, -5)));
        assert!(!ccw(a, b, Point::new(20, 0)));
    }

    #[test]
    fn test_ccw_extreme_coordinates() {
        let a = Point::new(i32::MIN, i32::MIN);
        let b = Point::new(i32::MAX, i32::MIN);
        assert!(ccw(a, b, Point::new(0, i32::MAX)));
        assert!(!ccw(a, b, Point::new(i32::MAX, i32::MIN)));
        let line = LineSegment::new(Point::new(i32::MIN, 0), Point::new(i32::MAX, 0));
        assert!(line.intersects(Point::new(0, i32::MIN), Point::new(0, i32::MAX)));
    }

    #[test]
    fn test_segments_intersect_crossing_line() {
        let line = LineSegment::new(Point::new(43, 543), Point::new(550, 655));
        assert!(line.intersects(Point::new(100, 500), Point::new(100, 600)));
        assert!(line.intersects(Point::new(100, 600), Point::new(100, 500)));
    }

    #[test]
    fn test_segments_do_not_intersect() {
        let line = LineSegment::new(Point::new(43, 543), Point::new(550, 655));
        // both above the line
        assert!(!line.intersects(Point::new(100, 400), Point::new(100, 500)));
        // beyond the line's end point
        assert!(!line.intersects(Point::new(700, 600), Point::new(700, 700)));
        // no motion
        assert!(!line.intersects(Point::new(100, 500), Point::new(100, 500)));
    }

    #[test]
    fn test_band_is_closed() {
        let band = HorizontalBand::new(200, 260);
        assert!(band.contains_y(200));
        assert!(band.contains_y(230));
        assert!(band.contains_y(260));
        assert!(!band.contains_y(199));
        assert!(!band.contains_y(261));
    }
}
