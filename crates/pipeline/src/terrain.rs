//! Terrain inputs for a run, derived from a DEM and the drainage network

use crate::config::VbetConfig;
use crate::fsutil::write_atomic;
use std::path::{Path, PathBuf};
use tracing::info;
use vbet_algorithms::network::load_network;
use vbet_algorithms::terrain::derive_terrain;
use vbet_core::io::{read_geotiff, read_layer, write_geotiff_to_buffer};
use vbet_core::vector::FeatureCollection;
use vbet_core::{Raster, Result};

/// Paths of the derived rasters
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainOutputs {
    pub slope: PathBuf,
    pub hand: PathBuf,
    pub hillshade: PathBuf,
}

/// Derive `slope.tif`, `hand.tif` and `hillshade.tif` in `out_dir`.
///
/// Drainage cells for HAND come from the filtered network rasterized onto
/// the DEM grid, so the rasters line up with what a run will read back.
pub fn derive_terrain_files(
    dem: &Path,
    network: &Path,
    waterbodies: Option<&Path>,
    out_dir: &Path,
    config: &VbetConfig,
) -> Result<TerrainOutputs> {
    config.terrain.validate()?;
    let dem: Raster<f64> = read_geotiff(dem)?;
    let spec = dem.grid_spec();

    let lines = read_layer(network)?;
    let areas = match waterbodies {
        Some(path) => read_layer(path)?,
        None => FeatureCollection::new(),
    };
    let net = load_network(&lines, &areas, spec.crs.as_ref(), spec.cell_size(), &config.network)?;
    let drainage = net.drainage_mask(&spec);

    let set = derive_terrain(&dem, &drainage, &config.terrain)?;
    info!(rows = spec.rows, cols = spec.cols, reaches = net.reaches.len(), "terrain derived");

    let outputs = TerrainOutputs {
        slope: out_dir.join("slope.tif"),
        hand: out_dir.join("hand.tif"),
        hillshade: out_dir.join("hillshade.tif"),
    };
    for (raster, path) in [
        (&set.slope, &outputs.slope),
        (&set.hand, &outputs.hand),
        (&set.hillshade, &outputs.hillshade),
    ] {
        write_atomic(path, &write_geotiff_to_buffer(raster, None)?)?;
    }
    Ok(outputs)
}
