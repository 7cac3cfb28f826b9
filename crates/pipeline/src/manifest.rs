//! Run artifact manifest
//!
//! Ordered, append-only record of what a run produced. Written to
//! `outputs/manifest.json` when the run ends, successfully or not.

use crate::fsutil::write_json_atomic;
use crate::state::Stage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use vbet_core::Result;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Raster,
    Vector,
    Package,
    Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub stage: Stage,
    /// Path relative to the run's output directory
    pub path: String,
    pub sha256: String,
    /// Reused from a previous run
    pub cached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: String,
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub huc: String,
    pub version: String,
    pub status: RunStatus,
    /// Seconds since the Unix epoch
    pub started: u64,
    pub finished: Option<u64>,
    pub artifacts: Vec<Artifact>,
    pub error: Option<Failure>,
}

pub(crate) fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Manifest {
    pub fn new(huc: &str) -> Self {
        Self {
            huc: huc.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: RunStatus::Running,
            started: now(),
            finished: None,
            artifacts: Vec::new(),
            error: None,
        }
    }

    pub fn push(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    pub fn succeed(&mut self) {
        self.status = RunStatus::Succeeded;
        self.finished = Some(now());
    }

    pub fn fail(&mut self, kind: String, stage: Stage, message: String) {
        self.status = RunStatus::Failed;
        self.finished = Some(now());
        self.error = Some(Failure { kind, stage, message });
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| vbet_core::Error::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| vbet_core::Error::format(path, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        let mut manifest = Manifest::new("1701020304");
        manifest.push(Artifact {
            name: "likelihood".into(),
            kind: ArtifactKind::Raster,
            stage: Stage::ComputingLikelihood,
            path: "intermediates/likelihood.tif".into(),
            sha256: "00".into(),
            cached: false,
        });
        manifest.fail("GridMismatchError".into(), Stage::LoadingInputs, "bad".into());
        manifest.write(&path).unwrap();

        let back = Manifest::read(&path).unwrap();
        assert_eq!(back, manifest);
        assert_eq!(back.status, RunStatus::Failed);
        assert!(back.finished.is_some());
    }
}
