//! Terrain metrics derived from a DEM
//!
//! - Slope (degrees, Horn 1981)
//! - Hillshade (0-255)
//! - Derivation of the full slope / HAND / hillshade set on a DEM grid

mod derive;
mod hillshade;
mod slope;

pub use derive::{derive_terrain, TerrainParams, TerrainSet};
pub use hillshade::{hillshade, HillshadeParams};
pub use slope::{slope, Slope, SlopeParams};
