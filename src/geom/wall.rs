use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geom::point::Point;
use crate::geom::segment::Segment;
use crate::geom::vector::Vector;

/// Eight-way compass bucket of the direction a wall faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Orientation {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::N,
        Orientation::NE,
        Orientation::E,
        Orientation::SE,
        Orientation::S,
        Orientation::SW,
        Orientation::W,
        Orientation::NW,
    ];

    /// Bucket for a compass bearing in degrees (0 = north, clockwise).
    pub fn from_bearing(bearing_deg: f64) -> Self {
        let b = bearing_deg.rem_euclid(360.0);
        let idx = ((b + 22.5) / 45.0).floor() as usize % 8;
        Self::ALL[idx]
    }

    /// Center bearing of the bucket.
    pub fn bearing(&self) -> f64 {
        let idx = Self::ALL.iter().position(|o| o == self).unwrap_or(0);
        idx as f64 * 45.0
    }

    pub fn is_cardinal(&self) -> bool {
        matches!(self, Self::N | Self::E | Self::S | Self::W)
    }

    /// Angular distance between two buckets in degrees (0..=180).
    pub fn angular_distance(&self, other: &Self) -> f64 {
        let d = (self.bearing() - other.bearing()).abs();
        d.min(360.0 - d)
    }

    /// Compass bearing of a page-space direction.
    ///
    /// Page coordinates have y pointing down. `north_angle_deg` is the clockwise
    /// angle from page-up to the north arrow.
    pub fn bearing_of_page_direction(dir: Vector, north_angle_deg: f64) -> f64 {
        let page_bearing = dir.dx.atan2(-dir.dy).to_degrees();
        (page_bearing - north_angle_deg).rem_euclid(360.0)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Exterior wall segment of a floor plan, in feet.
///
/// Fields are private: a wall is fixed once the geometry extractor has built
/// it. Openings are attached by constructing a new wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    start: Point,
    end: Point,
    height: f64,
    orientation: Orientation,
    window_area: f64,
    door_area: f64,
}

/// Openings may never take more than this share of a wall.
pub const MAX_OPENING_FRACTION: f64 = 0.9;

impl Wall {
    pub fn new(start: Point, end: Point, height: f64, orientation: Orientation) -> Self {
        Self {
            start,
            end,
            height: height.max(0.0),
            orientation,
            window_area: 0.0,
            door_area: 0.0,
        }
    }

    /// Returns a copy with window and door areas attached.
    ///
    /// Requested areas are clamped so that openings never exceed
    /// [`MAX_OPENING_FRACTION`] of the gross wall area; windows and doors are
    /// scaled down together when they would.
    pub fn with_openings(&self, window_area: f64, door_area: f64) -> Self {
        let window_area = window_area.max(0.0);
        let door_area = door_area.max(0.0);
        let cap = self.gross_area() * MAX_OPENING_FRACTION;
        let total = window_area + door_area;
        let k = if total > cap && total > 0.0 { cap / total } else { 1.0 };
        Self {
            window_area: window_area * k,
            door_area: door_area * k,
            ..self.clone()
        }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    pub fn segment(&self) -> Segment {
        Segment::new(self.start, self.end)
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn window_area(&self) -> f64 {
        self.window_area
    }

    pub fn door_area(&self) -> f64 {
        self.door_area
    }

    pub fn gross_area(&self) -> f64 {
        self.length() * self.height
    }

    pub fn net_area(&self) -> f64 {
        (self.gross_area() - self.window_area - self.door_area).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_from_bearing() {
        assert_eq!(Orientation::from_bearing(0.0), Orientation::N);
        assert_eq!(Orientation::from_bearing(359.0), Orientation::N);
        assert_eq!(Orientation::from_bearing(22.4), Orientation::N);
        assert_eq!(Orientation::from_bearing(22.6), Orientation::NE);
        assert_eq!(Orientation::from_bearing(180.0), Orientation::S);
        assert_eq!(Orientation::from_bearing(-90.0), Orientation::W);
        assert!((Orientation::NW.angular_distance(&Orientation::NE) - 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_page_direction_bearing() {
        // Page up with north arrow pointing up is north
        let up = Vector::new(0., -1.);
        assert!(Orientation::bearing_of_page_direction(up, 0.0).abs() < 1e-9);
        let right = Vector::new(1., 0.);
        assert!((Orientation::bearing_of_page_direction(right, 0.0) - 90.0).abs() < 1e-9);
        // North arrow rotated 90° clockwise: page-right is now north
        assert!(Orientation::bearing_of_page_direction(right, 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_openings_are_capped() {
        let w = Wall::new(Point::new(0., 0.), Point::new(10., 0.), 8.0, Orientation::S);
        assert!((w.gross_area() - 80.0).abs() < 1e-12);
        let w2 = w.with_openings(100.0, 20.0);
        assert!(w2.window_area() + w2.door_area() <= 72.0 + 1e-9);
        assert!(w2.net_area() >= 0.0);
        let w3 = w.with_openings(15.0, 20.0);
        assert!((w3.net_area() - 45.0).abs() < 1e-12);
        // Original is untouched
        assert!(w.window_area().abs() < 1e-12);
    }
}
