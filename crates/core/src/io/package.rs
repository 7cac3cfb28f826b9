//! Vector package: a directory holding one GeoJSON file per layer plus a
//! `package.json` index

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::io::{read_layer, write_layer_string};
use crate::vector::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const INDEX_FILE: &str = "package.json";

/// One entry of the package index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageLayer {
    pub name: String,
    pub file: String,
    pub feature_count: usize,
}

/// Contents of `package.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageIndex {
    pub layers: Vec<PackageLayer>,
    pub crs: Option<String>,
    /// False while layers are still being written
    pub complete: bool,
}

/// Write every layer into `dir`, bracketed by an incomplete index before
/// the first layer and the complete index after the last.
///
/// Layer names become file stems (`<name>.geojson`).
pub fn write_package<P: AsRef<Path>>(
    dir: P,
    layers: &[(String, FeatureCollection)],
    crs: Option<&CRS>,
) -> Result<PackageIndex> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let mut index = PackageIndex {
        layers: Vec::with_capacity(layers.len()),
        crs: crs.map(CRS::identifier),
        complete: false,
    };
    write_index(dir, &index)?;

    for (name, layer) in layers {
        let file = format!("{name}.geojson");
        let path = dir.join(&file);
        std::fs::write(&path, write_layer_string(layer)).map_err(|e| Error::io(&path, e))?;
        index.layers.push(PackageLayer {
            name: name.clone(),
            file,
            feature_count: layer.len(),
        });
    }

    index.complete = true;
    write_index(dir, &index)?;
    Ok(index)
}

fn write_index(dir: &Path, index: &PackageIndex) -> Result<()> {
    let path = dir.join(INDEX_FILE);
    let json = serde_json::to_string_pretty(index).map_err(|e| Error::Other(e.to_string()))?;
    std::fs::write(&path, json).map_err(|e| Error::io(&path, e))
}

/// Read a package index and its layers. Incomplete packages are rejected.
pub fn read_package<P: AsRef<Path>>(dir: P) -> Result<(PackageIndex, Vec<(String, FeatureCollection)>)> {
    let dir = dir.as_ref();
    let path = dir.join(INDEX_FILE);
    let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
    let index: PackageIndex =
        serde_json::from_str(&text).map_err(|e| Error::format(&path, e.to_string()))?;
    if !index.complete {
        return Err(Error::format(&path, "package is incomplete"));
    }

    let layers = index
        .layers
        .iter()
        .map(|entry| Ok((entry.name.clone(), read_layer(dir.join(&entry.file))?)))
        .collect::<Result<Vec<_>>>()?;
    Ok((index, layers))
}
