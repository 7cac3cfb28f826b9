//! Project descriptor consumed by the upload client

use crate::fsutil::write_json_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use vbet_core::Result;

pub const PROJECT_FILE: &str = "project.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectLayer {
    pub id: String,
    pub name: String,
    /// `raster`, `vector` or `package`
    pub kind: String,
    /// Relative to the output directory; absolute for inputs outside it
    pub path: String,
}

impl ProjectLayer {
    pub fn new(id: &str, name: &str, kind: &str, path: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub name: String,
    pub project_type: String,
    pub meta: BTreeMap<String, String>,
    pub inputs: Vec<ProjectLayer>,
    pub intermediates: Vec<ProjectLayer>,
    pub outputs: Vec<ProjectLayer>,
}

impl ProjectDescriptor {
    /// Descriptor with the standard metadata. Caller tags are applied last
    /// and may override the defaults.
    pub fn new(huc: &str, timestamp: u64, extra: &BTreeMap<String, String>) -> Self {
        let mut meta = BTreeMap::new();
        meta.insert("HUC".to_string(), huc.to_string());
        meta.insert(format!("HUC{}", huc.len()), huc.to_string());
        meta.insert("VBETVersion".to_string(), env!("CARGO_PKG_VERSION").to_string());
        meta.insert("VBETTimestamp".to_string(), timestamp.to_string());
        meta.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            name: format!("VBET for HUC {huc}"),
            project_type: "VBET".to_string(),
            meta,
            inputs: Vec::new(),
            intermediates: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}
