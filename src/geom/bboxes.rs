use serde::{Deserialize, Serialize};

use crate::geom::EPS;
use crate::geom::point::Point;

/// Axis-aligned bounding box in the page plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self {
            min: Point::new(min.x.min(max.x), min.y.min(max.y)),
            max: Point::new(min.x.max(max.x), min.y.max(max.y)),
        }
    }

    /// Returns `None` for an empty point set.
    pub fn from_points(pts: &[Point]) -> Option<Self> {
        let first = pts.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in pts.iter().skip(1) {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self { min, max })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        self.min.midpoint(&self.max)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x - EPS
            && p.x <= self.max.x + EPS
            && p.y >= self.min.y - EPS
            && p.y <= self.max.y + EPS
    }

    /// Checks whether two bounding boxes overlap (touching counts).
    pub fn overlaps(&self, other: &Self) -> bool {
        !(self.max.x < other.min.x - EPS
            || self.min.x > other.max.x + EPS
            || self.max.y < other.min.y - EPS
            || self.min.y > other.max.y + EPS)
    }

    /// Grows the box by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    pub fn scale(&self, s: f64) -> Self {
        Self::new(self.min.scale(s), self.max.scale(s))
    }
}
