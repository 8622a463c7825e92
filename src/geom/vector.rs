use crate::geom::EPS;
use crate::geom::point::Point;
use std::fmt;
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector {
    pub dx: f64,
    pub dy: f64,
}

impl Vector {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn from_points(beg: Point, end: Point) -> Self {
        Self {
            dx: end.x - beg.x,
            dy: end.y - beg.y,
        }
    }

    /// Scalar (z component of the 3D) cross product.
    pub fn cross(self, other: Self) -> f64 {
        self.dx * other.dy - self.dy * other.dx
    }

    /// Dot product between 2 vectors.
    pub fn dot(self, other: Self) -> f64 {
        self.dx * other.dx + self.dy * other.dy
    }

    /// Returns the length of the vector.
    pub fn length(&self) -> f64 {
        (self.dx.powi(2) + self.dy.powi(2)).sqrt()
    }

    /// Normalizes the vector (divides by its length) and returns a copy.
    pub fn normalize(&self) -> Option<Self> {
        let len = self.length();
        if len < EPS {
            None
        } else {
            Some(Self {
                dx: self.dx / len,
                dy: self.dy / len,
            })
        }
    }

    /// Left-hand perpendicular (rotated +90° in a y-up frame).
    pub fn perpendicular(&self) -> Self {
        Self {
            dx: -self.dy,
            dy: self.dx,
        }
    }

    /// Angle of the vector in degrees, folded into [0, 180).
    ///
    /// Lines have no direction, so 10° and 190° describe the same primitive.
    pub fn undirected_angle_deg(&self) -> f64 {
        let a = self.dy.atan2(self.dx).to_degrees();
        a.rem_euclid(180.0)
    }

    /// Returns true if the two vectors are parallel within `tol_deg`.
    pub fn is_parallel(&self, other: &Self, tol_deg: f64) -> bool {
        let diff = (self.undirected_angle_deg() - other.undirected_angle_deg()).abs();
        diff.min(180.0 - diff) <= tol_deg
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = f.precision().unwrap_or(2); // Default 2 decimals
        write!(f, "Vector({:.prec$}, {:.prec$})", self.dx, self.dy, prec = prec)
    }
}

impl Add for Vector {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            dx: self.dx + other.dx,
            dy: self.dy + other.dy,
        }
    }
}

impl Sub for Vector {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            dx: self.dx - other.dx,
            dy: self.dy - other.dy,
        }
    }
}

impl Mul<f64> for Vector {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Self {
            dx: self.dx * s,
            dy: self.dy * s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_dot_length() {
        let a = Vector::new(1., 0.);
        let b = Vector::new(0., 2.);
        assert!((a.cross(b) - 2.0).abs() < 1e-12);
        assert!(a.dot(b).abs() < 1e-12);
        assert!((b.length() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_zero() {
        assert!(Vector::new(0., 0.).normalize().is_none());
        let n = Vector::new(3., 4.).normalize().unwrap();
        assert!((n.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_undirected_angle() {
        assert!((Vector::new(1., 0.).undirected_angle_deg()).abs() < 1e-9);
        assert!((Vector::new(-1., 0.).undirected_angle_deg()).abs() < 1e-9);
        assert!((Vector::new(0., -1.).undirected_angle_deg() - 90.0).abs() < 1e-9);
        assert!(Vector::new(1., 0.01).is_parallel(&Vector::new(-1., 0.), 1.0));
        assert!(!Vector::new(1., 0.).is_parallel(&Vector::new(0., 1.), 10.0));
    }
}
