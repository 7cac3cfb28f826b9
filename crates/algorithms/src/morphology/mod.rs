//! Binary morphology on 0/1 masks
//!
//! - **Dilation**: a cell is set when any element cell over it is set
//! - **Erosion**: a cell stays set only when every element cell over it is set
//! - **Closing**: dilation then erosion, bridges gaps narrower than the element

mod closing;
mod dilate;
mod element;
mod erode;

pub use closing::{closing, Closing, ClosingParams};
pub use dilate::dilate;
pub use element::StructuringElement;
pub use erode::erode;
