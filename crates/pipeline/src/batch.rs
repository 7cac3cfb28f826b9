//! Many watershed runs on a bounded worker pool
//!
//! Runs share nothing but the read-only inputs. Two jobs writing to the same
//! output directory, or to the same scratch directory, are rejected before
//! anything starts.

use crate::error::PipelineError;
use crate::run::{run, CancelToken, RunObserver, RunRequest, RunSummary};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use vbet_core::Error;
use vbet_parallel::{ParallelStrategy, ProcessingMode};

/// A batch job file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFile {
    pub jobs: Vec<RunRequest>,
}

impl BatchFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> vbet_core::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let batch: BatchFile = serde_json::from_str(&text).map_err(|e| Error::format(path, e.to_string()))?;
        for job in &batch.jobs {
            job.config.validate()?;
        }
        Ok(batch)
    }
}

/// Result of one job
#[derive(Debug)]
pub struct BatchOutcome {
    pub huc: String,
    pub result: Result<RunSummary, PipelineError>,
}

/// Lexical normalization, so `out/a` and `out/./a` collide
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn check_disjoint(jobs: &[RunRequest]) -> Result<(), PipelineError> {
    let mut seen: HashMap<PathBuf, &str> = HashMap::new();
    for job in jobs {
        let mut dirs = vec![normalize(&job.output_dir)];
        if let Some(temp) = &job.temp_folder {
            dirs.push(normalize(&temp.join(&job.huc)));
        }
        for dir in dirs {
            if let Some(first) = seen.insert(dir.clone(), &job.huc) {
                return Err(PipelineError::SharedOutput {
                    first: first.to_string(),
                    second: job.huc.clone(),
                    dir,
                });
            }
        }
    }
    Ok(())
}

/// Run every job, at most `mode`'s worth at a time.
///
/// One job failing does not stop the others. Outcomes come back in job order.
pub fn run_batch(
    jobs: &[RunRequest],
    mode: ProcessingMode,
    observer: &dyn RunObserver,
    cancel: &CancelToken,
) -> Result<Vec<BatchOutcome>, PipelineError> {
    check_disjoint(jobs)?;
    info!(jobs = jobs.len(), ?mode, "batch started");

    let outcomes = mode.par_map(0..jobs.len(), |i| {
        let job = &jobs[i];
        BatchOutcome {
            huc: job.huc.clone(),
            result: run(job, observer, cancel),
        }
    })?;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "batch finished with failures");
    } else {
        info!(total = outcomes.len(), "batch finished");
    }
    Ok(outcomes)
}
