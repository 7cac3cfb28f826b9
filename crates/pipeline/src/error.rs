//! Pipeline error type

use crate::state::Stage;
use std::path::PathBuf;
use thiserror::Error;
use vbet_parallel::PoolError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A component failed inside a stage
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: vbet_core::Error,
    },

    #[error("run cancelled before {stage}")]
    Cancelled { stage: Stage },

    #[error("batch jobs {first} and {second} share output directory {dir}")]
    SharedOutput {
        first: String,
        second: String,
        dir: PathBuf,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Core(#[from] vbet_core::Error),
}

impl PipelineError {
    pub(crate) fn at(stage: Stage) -> impl FnOnce(vbet_core::Error) -> Self {
        move |source| PipelineError::Stage { stage, source }
    }

    /// Stage the run was in, if the error happened inside a run
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } | PipelineError::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    /// Stable error kind name recorded in manifests
    pub fn kind_name(&self) -> String {
        match self {
            PipelineError::Stage { source, .. } | PipelineError::Core(source) => source.kind().to_string(),
            PipelineError::Cancelled { .. } => "Cancelled".to_string(),
            PipelineError::SharedOutput { .. } => "ConfigError".to_string(),
            PipelineError::Pool(_) => "InternalError".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_reports_kind() {
        let err = PipelineError::at(Stage::LoadingInputs)(vbet_core::Error::EmptyNetwork {
            total: 2,
            allowed: "1,2".into(),
        });
        assert_eq!(err.stage(), Some(Stage::LoadingInputs));
        assert_eq!(err.kind_name(), "EmptyNetworkError");
        assert!(err.to_string().starts_with("LoadingInputs failed"));
    }
}
