//! Vector helpers for valley bottom layers
//!
//! - Area / Perimeter / part count measurements
//! - Bounding boxes for segment indexing
//! - Dissolve: merge polygons into one multipart geometry

mod measurements;
mod spatial;

pub use measurements::{area, part_count, perimeter, polygon_perimeter, ring_length};
pub use spatial::{dissolve, BoundingBox};
