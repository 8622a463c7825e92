//! Plan geometry kernel.
//!
//! Drawings are flat, so everything here lives in the page plane. Coordinates are
//! either page pixels (raw extraction) or feet (after scaling); the types do not
//! care which, the caller keeps track of units.

pub mod bboxes;
pub mod point;
pub mod polygon;
pub mod segment;
pub mod vector;
pub mod wall;

/// Geometric precision
pub const EPS: f64 = 1e-9;
