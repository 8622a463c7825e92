//! Line segment operations in the page plane.

use serde::{Deserialize, Serialize};

use crate::geom::EPS;
use crate::geom::point::Point;
use crate::geom::vector::Vector;

/// Straight segment between two points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    pub fn direction(&self) -> Vector {
        self.end - self.start
    }

    pub fn midpoint(&self) -> Point {
        self.start.midpoint(&self.end)
    }

    pub fn scale(&self, s: f64) -> Self {
        Self::new(self.start.scale(s), self.end.scale(s))
    }

    /// Horizontal within `tol_deg` (page x axis).
    pub fn is_horizontal(&self, tol_deg: f64) -> bool {
        let a = self.direction().undirected_angle_deg();
        a <= tol_deg || a >= 180.0 - tol_deg
    }

    /// Vertical within `tol_deg` (page y axis).
    pub fn is_vertical(&self, tol_deg: f64) -> bool {
        (self.direction().undirected_angle_deg() - 90.0).abs() <= tol_deg
    }

    /// Shortest distance from a point to this segment.
    pub fn distance_to_point(&self, p: Point) -> f64 {
        p.distance(&self.closest_point(p))
    }

    pub fn closest_point(&self, p: Point) -> Point {
        let d = self.direction();
        let len_sq = d.dot(d);
        if len_sq < EPS * EPS {
            return self.start;
        }
        let t = ((p - self.start).dot(d) / len_sq).clamp(0.0, 1.0);
        Point::new_between_2_points(self.start, self.end, t)
    }

    /// Shortest distance between two segments (0 if they cross).
    pub fn distance_to_segment(&self, other: &Self) -> f64 {
        if segments_intersect(self, other) {
            return 0.0;
        }
        self.distance_to_point(other.start)
            .min(self.distance_to_point(other.end))
            .min(other.distance_to_point(self.start))
            .min(other.distance_to_point(self.end))
    }

    /// Length of `other` projected onto this segment's span.
    ///
    /// Used to estimate how much wall two parallel edges share.
    pub fn projected_overlap(&self, other: &Self) -> f64 {
        let Some(u) = self.direction().normalize() else {
            return 0.0;
        };
        let a0: f64 = 0.0;
        let a1 = self.length();
        let b0 = (other.start - self.start).dot(u);
        let b1 = (other.end - self.start).dot(u);
        let (b0, b1) = if b0 <= b1 { (b0, b1) } else { (b1, b0) };
        (a1.min(b1) - a0.max(b0)).max(0.0)
    }
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b - a).cross(c - a)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) - EPS
        && p.x <= a.x.max(b.x) + EPS
        && p.y >= a.y.min(b.y) - EPS
        && p.y <= a.y.max(b.y) + EPS
}

/// Checks if two segments intersect (touching counts).
pub fn segments_intersect(s1: &Segment, s2: &Segment) -> bool {
    let (p1, p2, p3, p4) = (s1.start, s1.end, s2.start, s2.end);
    let d1 = orientation(p3, p4, p1);
    let d2 = orientation(p3, p4, p2);
    let d3 = orientation(p1, p2, p3);
    let d4 = orientation(p1, p2, p4);

    if ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
    {
        return true;
    }

    (d1.abs() <= EPS && on_segment(p3, p4, p1))
        || (d2.abs() <= EPS && on_segment(p3, p4, p2))
        || (d3.abs() <= EPS && on_segment(p1, p2, p3))
        || (d4.abs() <= EPS && on_segment(p1, p2, p4))
}

/// Checks if two segments cross at a point interior to both.
///
/// Shared endpoints and collinear touching do not count. This is the test used
/// to detect self-intersecting polygon outlines.
pub fn segments_cross_properly(s1: &Segment, s2: &Segment) -> bool {
    let d1 = orientation(s2.start, s2.end, s1.start);
    let d2 = orientation(s2.start, s2.end, s1.end);
    let d3 = orientation(s1.start, s1.end, s2.start);
    let d4 = orientation(s1.start, s1.end, s2.end);
    ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
}

/// Intersection point of two infinite lines, if they are not parallel.
pub fn line_intersection(a0: Point, a1: Point, b0: Point, b1: Point) -> Option<Point> {
    let r = a1 - a0;
    let s = b1 - b0;
    let denom = r.cross(s);
    if denom.abs() < EPS {
        return None;
    }
    let t = (b0 - a0).cross(s) / denom;
    Some(a0 + r * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(x0: f64, y0: f64, x1: f64, y1: f64) -> Segment {
        Segment::new(Point::new(x0, y0), Point::new(x1, y1))
    }

    #[test]
    fn test_intersections() {
        assert!(segments_intersect(&seg(0., 0., 2., 2.), &seg(0., 2., 2., 0.)));
        assert!(segments_cross_properly(&seg(0., 0., 2., 2.), &seg(0., 2., 2., 0.)));
        // Touching at an endpoint is an intersection but not a proper crossing
        assert!(segments_intersect(&seg(0., 0., 1., 0.), &seg(1., 0., 1., 1.)));
        assert!(!segments_cross_properly(&seg(0., 0., 1., 0.), &seg(1., 0., 1., 1.)));
        assert!(!segments_intersect(&seg(0., 0., 1., 0.), &seg(0., 1., 1., 1.)));
    }

    #[test]
    fn test_distances() {
        let a = seg(0., 0., 10., 0.);
        assert!((a.distance_to_point(Point::new(5., 3.)) - 3.0).abs() < 1e-12);
        assert!((a.distance_to_point(Point::new(-4., 3.)) - 5.0).abs() < 1e-12);
        let b = seg(2., 0.5, 8., 0.5);
        assert!((a.distance_to_segment(&b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_projected_overlap() {
        let a = seg(0., 0., 10., 0.);
        let b = seg(12., 1., 6., 1.);
        assert!((a.projected_overlap(&b) - 4.0).abs() < 1e-12);
        let c = seg(11., 1., 15., 1.);
        assert!(a.projected_overlap(&c).abs() < 1e-12);
    }

    #[test]
    fn test_orientation_checks() {
        assert!(seg(0., 0., 10., 0.5).is_horizontal(5.0));
        assert!(seg(0., 10., 0.2, 0.).is_vertical(5.0));
        assert!(!seg(0., 0., 10., 10.).is_horizontal(10.0));
    }

    #[test]
    fn test_line_intersection() {
        let p = line_intersection(
            Point::new(0., 0.),
            Point::new(1., 0.),
            Point::new(3., -1.),
            Point::new(3., 1.),
        )
        .unwrap();
        assert!(p.is_close(&Point::new(3., 0.)));
        assert!(
            line_intersection(
                Point::new(0., 0.),
                Point::new(1., 0.),
                Point::new(0., 1.),
                Point::new(1., 1.)
            )
            .is_none()
        );
    }
}
