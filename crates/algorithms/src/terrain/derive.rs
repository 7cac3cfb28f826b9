//! Slope, HAND and hillshade produced together on one DEM grid

use crate::hydrology::{flow_direction, hand, priority_flood, PriorityFloodParams};
use crate::terrain::{hillshade, slope, HillshadeParams, SlopeParams};
use serde::{Deserialize, Serialize};
use vbet_core::raster::Raster;
use vbet_core::{Error, Result};

/// Parameters for terrain derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub z_factor: f64,
    /// Hillshade sun azimuth, degrees clockwise from north
    pub azimuth: f64,
    /// Hillshade sun altitude, degrees
    pub altitude: f64,
    /// Minimum rise enforced across filled depressions
    pub fill_epsilon: f64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            z_factor: 1.0,
            azimuth: 315.0,
            altitude: 45.0,
            fill_epsilon: 1e-5,
        }
    }
}

impl TerrainParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.z_factor > 0.0) {
            return Err(Error::InvalidParameter {
                name: "terrain.z_factor",
                value: self.z_factor.to_string(),
                reason: "must be positive".into(),
            });
        }
        if !(0.0..=90.0).contains(&self.altitude) {
            return Err(Error::InvalidParameter {
                name: "terrain.altitude",
                value: self.altitude.to_string(),
                reason: "must be within [0, 90] degrees".into(),
            });
        }
        if !(self.fill_epsilon >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "terrain.fill_epsilon",
                value: self.fill_epsilon.to_string(),
                reason: "must be non-negative".into(),
            });
        }
        Ok(())
    }
}

/// The three terrain rasters consumed by the evidence combiner
#[derive(Debug, Clone)]
pub struct TerrainSet {
    pub slope: Raster<f64>,
    pub hand: Raster<f64>,
    pub hillshade: Raster<f64>,
}

/// Derive slope, HAND and hillshade from a DEM.
///
/// `drainage` marks drainage cells (non-zero) on the DEM grid. HAND routes
/// over the priority-flood filled surface and measures heights on the
/// original DEM.
pub fn derive_terrain(dem: &Raster<f64>, drainage: &Raster<u8>, params: &TerrainParams) -> Result<TerrainSet> {
    params.validate()?;
    dem.grid_spec()
        .check_aligned(&drainage.grid_spec(), "dem", "drainage")?;

    let slope = slope(dem, &SlopeParams { z_factor: params.z_factor })?;
    let hillshade = hillshade(
        dem,
        &HillshadeParams {
            azimuth: params.azimuth,
            altitude: params.altitude,
            z_factor: params.z_factor,
        },
    )?;

    let filled = priority_flood(dem, &PriorityFloodParams { epsilon: params.fill_epsilon })?;
    let directions = flow_direction(&filled)?;
    let hand = hand(dem, &directions, drainage)?;

    Ok(TerrainSet { slope, hand, hillshade })
}
