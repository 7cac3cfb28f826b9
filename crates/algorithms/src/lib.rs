//! # VBET Algorithms
//!
//! Grid and vector algorithms behind the valley bottom pipeline.
//!
//! - **terrain**: slope, hillshade and HAND derivation from a DEM
//! - **hydrology**: priority-flood filling, D8 flow direction, HAND tracing
//! - **morphology**: binary erosion, dilation and closing of masks
//! - **network**: drainage network and waterbody loading, rasterization
//! - **evidence**: inflection curves, nearest-feature distance, likelihood fusion
//! - **classify**: threshold masks and raster-to-polygon tracing
//! - **cleaning**: hole filling, sliver removal, dissolve, validation and repair
//! - **vector**: area, perimeter and union helpers

pub mod classify;
pub mod cleaning;
pub mod evidence;
pub mod hydrology;
pub(crate) mod maybe_rayon;
pub mod morphology;
pub mod network;
pub mod terrain;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classify::{classify, layer_name, ClassifiedLayer};
    pub use crate::cleaning::{clean_layer, CleanParams, CleanedLayer};
    pub use crate::evidence::{
        compute_likelihood, EvidenceParams, FusionRule, InflectionCurve, LikelihoodSurface,
    };
    pub use crate::network::{load_network, Network, NetworkParams};
    pub use crate::terrain::{derive_terrain, TerrainParams, TerrainSet};
    pub use vbet_core::prelude::*;
}
