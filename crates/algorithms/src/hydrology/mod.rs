//! Hydrological conditioning and drainage-relative heights
//!
//! - Priority-Flood: O(n log n) depression filling (Barnes 2014)
//! - Flow direction: D8 single flow direction
//! - HAND: Height Above Nearest Drainage along D8 paths

mod flow_direction;
mod hand;
mod priority_flood;

pub use flow_direction::{flow_direction, FlowDirection};
pub use hand::hand;
pub use priority_flood::{priority_flood, PriorityFlood, PriorityFloodParams};
