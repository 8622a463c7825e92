//! Reading a floor plan: scale, exterior geometry, rooms and their adjacency.
//!
//! Every stage here consumes [`crate::io::PageExtraction`] primitives and
//! returns fresh value objects; nothing is mutated in place.

pub mod extract;
pub mod geometry;
pub mod graph;
pub mod scale;
pub mod space;

pub use extract::{ExtractionConfig, PageExtractor, PageKind, PageOutcome};
pub use geometry::{ExteriorGeometry, GeometryExtractor, GeometrySource};
pub use graph::{GraphConfig, RoomAdjacencyGraph, RoomGraphValidator};
pub use scale::{ScaleEstimate, ScaleMethod, ScaleResolver, ScaleResult};
pub use space::{BoundaryCondition, CeilingType, RoomType, Space, SpaceDetector};
