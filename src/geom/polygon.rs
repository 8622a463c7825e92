use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geom::EPS;
use crate::geom::bboxes::BoundingBox;
use crate::geom::point::Point;
use crate::geom::segment::{Segment, segments_cross_properly};

pub mod boolean;
pub mod relations;

/// Closed plan outline (room footprint, building footprint).
///
/// Vertices are kept counter-clockwise in a y-up frame; constructing from a
/// clockwise ring reverses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub name: String,
    pts: Vec<Point>,
}

impl Polygon {
    pub fn new(name: &str, pts: Vec<Point>) -> Result<Self> {
        let mut pts = dedup_ring(pts);
        if pts.len() < 3 {
            return Err(anyhow!(
                "Polygon {name} needs at least 3 distinct vertices, got {}",
                pts.len()
            ));
        }
        let signed = signed_area(&pts);
        if signed.abs() < EPS {
            return Err(anyhow!("Polygon {name} has zero area"));
        }
        if signed < 0.0 {
            pts.reverse();
        }
        Ok(Self {
            name: name.to_string(),
            pts,
        })
    }

    /// Axis-aligned rectangle from two opposite corners.
    pub fn rectangle(name: &str, min: Point, max: Point) -> Result<Self> {
        let bb = BoundingBox::new(min, max);
        Self::new(name, bb.corners().to_vec())
    }

    /// Square of area `area` centered at `center`.
    pub fn square_around(name: &str, center: Point, area: f64) -> Result<Self> {
        let half = area.max(0.0).sqrt() / 2.0;
        Self::rectangle(
            name,
            Point::new(center.x - half, center.y - half),
            Point::new(center.x + half, center.y + half),
        )
    }

    pub fn vertices(&self) -> &[Point] {
        &self.pts
    }

    pub fn edges(&self) -> Vec<Segment> {
        let n = self.pts.len();
        (0..n)
            .map(|i| Segment::new(self.pts[i], self.pts[(i + 1) % n]))
            .collect()
    }

    /// Area from the shoelace formula.
    pub fn area(&self) -> f64 {
        signed_area(&self.pts).abs()
    }

    pub fn perimeter(&self) -> f64 {
        self.edges().iter().map(|e| e.length()).sum()
    }

    pub fn bbox(&self) -> BoundingBox {
        // Non-empty by construction
        BoundingBox::from_points(&self.pts).unwrap_or(BoundingBox::new(self.pts[0], self.pts[0]))
    }

    /// Area centroid.
    pub fn centroid(&self) -> Point {
        let n = self.pts.len();
        let a = signed_area(&self.pts);
        if a.abs() < EPS {
            return self.bbox().center();
        }
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let p = self.pts[i];
            let q = self.pts[(i + 1) % n];
            let cross = p.x * q.y - q.x * p.y;
            cx += (p.x + q.x) * cross;
            cy += (p.y + q.y) * cross;
        }
        Point::new(cx / (6.0 * a), cy / (6.0 * a))
    }

    /// Returns true if no two non-adjacent edges cross.
    pub fn is_simple(&self) -> bool {
        let edges = self.edges();
        let n = edges.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if j == i + 1 || (i == 0 && j == n - 1) {
                    continue;
                }
                if segments_cross_properly(&edges[i], &edges[j]) {
                    return false;
                }
            }
        }
        true
    }

    /// Convex hull of the vertices (Andrew's monotone chain).
    ///
    /// Used to repair self-intersecting outlines: the hull never crosses itself
    /// and keeps the extent of the original drawing.
    pub fn convex_hull(&self) -> Result<Self> {
        let hull = convex_hull(&self.pts);
        Self::new(&self.name, hull)
    }

    /// Point-in-polygon by ray casting. Boundary points count as inside.
    pub fn contains(&self, p: Point) -> bool {
        for e in self.edges() {
            if e.distance_to_point(p) < EPS {
                return true;
            }
        }
        let n = self.pts.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.pts[i];
            let pj = self.pts[j];
            if (pi.y > p.y) != (pj.y > p.y) {
                let x_cross = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    pub fn is_convex(&self) -> bool {
        let n = self.pts.len();
        (0..n).all(|i| {
            let a = self.pts[i];
            let b = self.pts[(i + 1) % n];
            let c = self.pts[(i + 2) % n];
            (b - a).cross(c - b) >= -EPS
        })
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = f.precision().unwrap_or(2);
        write!(f, "Polygon({}, ", self.name)?;
        for p in &self.pts {
            write!(f, "{:.prec$}, ", p, prec = prec)?;
        }
        write!(f, "area={:.prec$})", self.area(), prec = prec)
    }
}

/// Signed shoelace area (positive for counter-clockwise rings).
pub fn signed_area(pts: &[Point]) -> f64 {
    let n = pts.len();
    if n < 3 {
        return 0.0;
    }
    let mut s = 0.0;
    for i in 0..n {
        let p = pts[i];
        let q = pts[(i + 1) % n];
        s += p.x * q.y - q.x * p.y;
    }
    0.5 * s
}

fn dedup_ring(pts: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(pts.len());
    for p in pts {
        if out.last().is_none_or(|last: &Point| !last.is_close(&p)) {
            out.push(p);
        }
    }
    while out.len() > 1 && out[0].is_close(&out[out.len() - 1]) {
        out.pop();
    }
    out
}

pub fn convex_hull(pts: &[Point]) -> Vec<Point> {
    let mut sorted: Vec<Point> = pts.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup_by(|a, b| a.is_close(b));
    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower: Vec<Point> = Vec::new();
    for p in &sorted {
        while lower.len() >= 2
            && (lower[lower.len() - 1] - lower[lower.len() - 2]).cross(*p - lower[lower.len() - 1])
                <= EPS
        {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Point> = Vec::new();
    for p in sorted.iter().rev() {
        while upper.len() >= 2
            && (upper[upper.len() - 1] - upper[upper.len() - 2]).cross(*p - upper[upper.len() - 1])
                <= EPS
        {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Polygon {
        Polygon::rectangle("sq", Point::new(0., 0.), Point::new(size, size)).unwrap()
    }

    #[test]
    fn test_area_perimeter() {
        let sq = square(10.);
        assert!((sq.area() - 100.0).abs() < 1e-12);
        assert!((sq.perimeter() - 40.0).abs() < 1e-12);
        assert!(sq.centroid().is_close(&Point::new(5., 5.)));
    }

    #[test]
    fn test_l_shape_area() {
        let pts = vec![
            Point::new(0., 0.),
            Point::new(2., 0.),
            Point::new(2., 1.),
            Point::new(1., 1.),
            Point::new(1., 2.),
            Point::new(0., 2.),
        ];
        let poly = Polygon::new("l", pts).unwrap();
        assert!((poly.area() - 3.0).abs() < 1e-12);
        assert!(poly.is_simple());
        assert!(!poly.is_convex());
    }

    #[test]
    fn test_clockwise_input_is_reversed() {
        let pts = vec![
            Point::new(0., 0.),
            Point::new(0., 1.),
            Point::new(1., 1.),
            Point::new(1., 0.),
        ];
        let poly = Polygon::new("cw", pts).unwrap();
        assert!(signed_area(poly.vertices()) > 0.0);
    }

    #[test]
    fn test_degenerate_rejected() {
        assert!(Polygon::new("line", vec![Point::new(0., 0.), Point::new(1., 0.)]).is_err());
        let collinear = vec![Point::new(0., 0.), Point::new(1., 0.), Point::new(2., 0.)];
        assert!(Polygon::new("flat", collinear).is_err());
    }

    #[test]
    fn test_bowtie_repair() {
        let pts = vec![
            Point::new(0., 0.),
            Point::new(2., 2.),
            Point::new(2., 0.),
            Point::new(0., 2.),
        ];
        let bowtie = Polygon::new("bowtie", pts).unwrap();
        assert!(!bowtie.is_simple());
        let repaired = bowtie.convex_hull().unwrap();
        assert!(repaired.is_simple());
        assert!((repaired.area() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_contains() {
        let sq = square(4.);
        assert!(sq.contains(Point::new(2., 2.)));
        assert!(sq.contains(Point::new(0., 2.)));
        assert!(!sq.contains(Point::new(5., 2.)));
    }
}
