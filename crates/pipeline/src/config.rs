//! Run configuration
//!
//! A JSON document whose sections all default, so `{}` is a complete
//! configuration:
//!
//! ```json
//! {
//!   "evidence": { "max_search_distance": 150.0, "fusion": "topo_channel_max" },
//!   "classify": { "thresholds": [0.5, 0.9] },
//!   "clean": { "min_hole_area": 50000.0 },
//!   "network": { "reach_codes": ["46006", "55800"] },
//!   "terrain": { "z_factor": 1.0 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use vbet_algorithms::classify::validate_thresholds;
use vbet_algorithms::cleaning::CleanParams;
use vbet_algorithms::evidence::EvidenceParams;
use vbet_algorithms::network::NetworkParams;
use vbet_algorithms::terrain::TerrainParams;
use vbet_core::{Error, Result};

/// Confidence levels to produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub thresholds: Vec<f64>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![0.5, 0.6, 0.7, 0.8, 0.9, 1.0],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VbetConfig {
    pub evidence: EvidenceParams,
    pub classify: ClassifyConfig,
    pub clean: CleanParams,
    pub network: NetworkParams,
    pub terrain: TerrainParams,
}

impl VbetConfig {
    /// Read a JSON configuration file. Invalid inflection curves are
    /// rejected while parsing.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: VbetConfig = serde_json::from_str(&text).map_err(|e| Error::InvalidParameter {
            name: "config",
            value: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.evidence.validate()?;
        validate_thresholds(&self.classify.thresholds)?;
        self.clean.validate()?;
        self.terrain.validate()
    }
}
