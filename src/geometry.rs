//! Region-of-interest geometry.
//!
//! The ROI is the polygon covering the cart/checkout zone of the frame. A
//! detection counts as "in the cart" when the center of its bounding box lies
//! inside the polygon or exactly on one of its edges.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Frame resolution in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned box in pixel coordinates, `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Returns `None` for empty or inverted boxes.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        if x1 < x2 && y1 < y2 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    /// Center on the pixel grid, floored toward the top-left.
    pub fn center(&self) -> Point {
        let cx = (i64::from(self.x1) + i64::from(self.x2)).div_euclid(2);
        let cy = (i64::from(self.y1) + i64::from(self.y2)).div_euclid(2);
        // The mean of two i32 values always fits back into i32.
        Point::new(cx as i32, cy as i32)
    }

    pub fn is_degenerate(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }
}

/// Closed polygon; the last vertex connects back to the first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoiPolygon {
    points: Vec<Point>,
    collinear: bool,
}

impl RoiPolygon {
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if points.len() < 3 {
            return Err(anyhow!(
                "roi polygon needs at least 3 points, got {}",
                points.len()
            ));
        }
        let collinear = is_collinear(&points);
        if collinear {
            log::warn!("roi polygon has zero area; every detection will be rejected");
        }
        Ok(Self { points, collinear })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Rescale from the configured reference resolution to the actual frame
    /// resolution. Coordinates truncate toward zero.
    pub fn rescaled(&self, reference: Resolution, actual: Resolution) -> Result<Self> {
        if reference.width == 0 || reference.height == 0 {
            return Err(anyhow!("roi reference resolution must be non-zero"));
        }
        if reference == actual {
            return Ok(self.clone());
        }
        let sx = f64::from(actual.width) / f64::from(reference.width);
        let sy = f64::from(actual.height) / f64::from(reference.height);
        let points = self
            .points
            .iter()
            .map(|p| Point::new((f64::from(p.x) * sx) as i32, (f64::from(p.y) * sy) as i32))
            .collect();
        Self::new(points)
    }

    /// Point-in-polygon test, inclusive of the boundary.
    ///
    /// Zero-area polygons contain nothing. Self-intersecting polygons follow
    /// the even-odd rule.
    pub fn contains_point(&self, p: Point) -> bool {
        if self.collinear {
            return false;
        }
        let n = self.points.len();
        let mut inside = false;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            if on_segment(a, b, p) {
                return true;
            }
            if (a.y > p.y) != (b.y > p.y) {
                let t =
                    (f64::from(p.y) - f64::from(a.y)) / (f64::from(b.y) - f64::from(a.y));
                let x_cross = f64::from(a.x) + t * (f64::from(b.x) - f64::from(a.x));
                if f64::from(p.x) < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

/// ROI containment for a detection box, judged by the box center.
pub fn contains(bbox: &BoundingBox, polygon: &RoiPolygon) -> bool {
    if bbox.is_degenerate() {
        return false;
    }
    polygon.contains_point(bbox.center())
}

// i128 keeps the products exact across the full i32 coordinate range.
fn cross(o: Point, a: Point, b: Point) -> i128 {
    let (ox, oy) = (i128::from(o.x), i128::from(o.y));
    (i128::from(a.x) - ox) * (i128::from(b.y) - oy)
        - (i128::from(a.y) - oy) * (i128::from(b.x) - ox)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    cross(a, b, p) == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

fn is_collinear(points: &[Point]) -> bool {
    let origin = points[0];
    let Some(&other) = points.iter().find(|p| **p != origin) else {
        return true;
    };
    points.iter().all(|p| cross(origin, other, *p) == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> RoiPolygon {
        RoiPolygon::new(vec![
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(100, 100),
            Point::new(0, 100),
        ])
        .unwrap()
    }

    fn cart_zone() -> RoiPolygon {
        RoiPolygon::new(vec![
            Point::new(100, 200),
            Point::new(540, 200),
            Point::new(600, 470),
            Point::new(40, 470),
        ])
        .unwrap()
    }

    #[test]
    fn center_floors_toward_top_left() {
        let bbox = BoundingBox::new(10, 10, 21, 13).unwrap();
        assert_eq!(bbox.center(), Point::new(15, 11));
        let negative = BoundingBox::new(-3, -3, 0, 0).unwrap();
        assert_eq!(negative.center(), Point::new(-2, -2));
    }

    #[test]
    fn rejects_inverted_boxes() {
        assert!(BoundingBox::new(10, 10, 10, 20).is_none());
        assert!(BoundingBox::new(10, 20, 30, 5).is_none());
    }

    #[test]
    fn center_on_edge_counts_as_inside() {
        // center (100, 50) lies on the right edge
        let bbox = BoundingBox::new(90, 40, 110, 60).unwrap();
        assert!(contains(&bbox, &square()));
        // center (0, 0) is a vertex
        let corner = BoundingBox::new(-5, -5, 5, 5).unwrap();
        assert!(contains(&corner, &square()));
    }

    #[test]
    fn center_outside_is_rejected_despite_overlap() {
        // mostly overlapping the square, but center (105, 50) is outside
        let bbox = BoundingBox::new(10, 0, 200, 100).unwrap();
        assert!(!contains(&bbox, &square()));
    }

    #[test]
    fn slanted_edges_of_cart_zone() {
        let zone = cart_zone();
        assert!(zone.contains_point(Point::new(320, 300)));
        assert!(!zone.contains_point(Point::new(50, 210)));
        assert!(!zone.contains_point(Point::new(320, 100)));
        assert!(zone.contains_point(Point::new(570, 335)));
    }

    #[test]
    fn degenerate_polygon_contains_nothing() {
        let line = RoiPolygon::new(vec![
            Point::new(0, 0),
            Point::new(50, 50),
            Point::new(100, 100),
        ])
        .unwrap();
        assert!(!line.contains_point(Point::new(50, 50)));
        assert!(RoiPolygon::new(vec![Point::new(0, 0), Point::new(1, 1)]).is_err());
    }

    #[test]
    fn self_intersecting_polygon_does_not_panic() {
        let bowtie = RoiPolygon::new(vec![
            Point::new(0, 0),
            Point::new(100, 100),
            Point::new(100, 0),
            Point::new(0, 100),
        ])
        .unwrap();
        let _ = bowtie.contains_point(Point::new(50, 50));
        assert!(bowtie.contains_point(Point::new(90, 50)));
    }

    #[test]
    fn rescale_scales_each_axis() {
        let scaled = cart_zone()
            .rescaled(Resolution::new(640, 480), Resolution::new(1280, 720))
            .unwrap();
        assert_eq!(
            scaled.points(),
            &[
                Point::new(200, 300),
                Point::new(1080, 300),
                Point::new(1200, 705),
                Point::new(80, 705),
            ]
        );
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let huge = RoiPolygon::new(vec![
            Point::new(-2_000_000_000, -2_000_000_000),
            Point::new(2_000_000_000, -2_000_000_000),
            Point::new(2_000_000_000, 2_000_000_000),
        ])
        .unwrap();
        assert!(huge.contains_point(Point::new(1_000_000_000, 0)));
        assert!(huge.contains_point(Point::new(2_000_000_000, 0)));
        assert!(!huge.contains_point(Point::new(-1_000_000_000, 0)));

        let line = RoiPolygon::new(vec![
            Point::new(i32::MIN, i32::MIN),
            Point::new(0, 0),
            Point::new(i32::MAX, i32::MAX),
        ])
        .unwrap();
        assert!(!line.contains_point(Point::new(0, 0)));
    }
}
