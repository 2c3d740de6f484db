//! Layout of family graphs on the plane.

pub mod engine;
pub mod geometry;

pub use engine::{IdOrder, LayoutEngine, LineageSource};
pub use geometry::{BoundingBox, LayoutResult, Point, Segment, SegmentKind};
