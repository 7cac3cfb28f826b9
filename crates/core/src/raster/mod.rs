//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod neighborhood;
mod spec;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use neighborhood::{d8, Connectivity};
pub use spec::GridSpec;
