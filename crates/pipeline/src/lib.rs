//! # VBET Pipeline
//!
//! Orchestrates one watershed run through its stages, persisting each
//! stage's artifact atomically before the next stage starts.
//!
//! - **config**: `VbetConfig` with evidence, classify, clean, network and terrain sections
//! - **state**: the stage machine
//! - **cache**: content-hash cache keys in `intermediates/cache.json`
//! - **manifest**: the run artifact manifest
//! - **project**: the project descriptor for the upload client
//! - **workdir**: scratch directory guard
//! - **run**: the run orchestrator
//! - **batch**: many watersheds on a bounded worker pool
//! - **terrain**: slope, HAND and hillshade files from a DEM

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod project;
pub mod run;
pub mod state;
pub mod terrain;
pub mod workdir;

mod fsutil;

pub use batch::{run_batch, BatchFile, BatchOutcome};
pub use config::{ClassifyConfig, VbetConfig};
pub use error::PipelineError;
pub use manifest::{Manifest, RunStatus};
pub use run::{run, CancelToken, InputPaths, LayerSummary, NoopObserver, RunObserver, RunRequest, RunSummary};
pub use state::Stage;
pub use terrain::{derive_terrain_files, TerrainOutputs};
