//! Processing modes and the worker-pool strategy

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to set up a worker pool
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool needs at least one thread")]
    ZeroThreads,
    #[error("cannot build worker pool: {0}")]
    Build(String),
}

/// Processing mode for independent work items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// One item after another on the calling thread
    Sequential,
    /// All available cores
    #[default]
    Parallel,
    /// A dedicated pool with this many threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Mode for an optional job count: `None` uses every core, `Some(1)`
    /// runs sequentially.
    pub fn from_jobs(jobs: Option<usize>) -> Self {
        match jobs {
            None => ProcessingMode::Parallel,
            Some(1) => ProcessingMode::Sequential,
            Some(n) => ProcessingMode::ParallelWith(n),
        }
    }
}

/// Strategy for executing indexed work
pub trait ParallelStrategy {
    /// Map a function over indices, results in index order
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>, PoolError>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>, PoolError>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => Ok(range.map(f).collect()),
            #[cfg(feature = "parallel")]
            ProcessingMode::Parallel => Ok(range.into_par_iter().map(f).collect()),
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(threads) => {
                if *threads == 0 {
                    return Err(PoolError::ZeroThreads);
                }
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .map_err(|e| PoolError::Build(e.to_string()))?;
                Ok(pool.install(|| range.into_par_iter().map(f).collect()))
            }
            #[cfg(not(feature = "parallel"))]
            ProcessingMode::Parallel | ProcessingMode::ParallelWith(_) => Ok(range.map(f).collect()),
        }
    }
}

/// Number of threads the default pool would use
pub fn num_cpus() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_results_keep_index_order() {
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(3),
        ] {
            let out = mode.par_map(0..50, |i| i * i).unwrap();
            assert_eq!(out, (0..50).map(|i| i * i).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_every_item_runs_once() {
        let counter = AtomicUsize::new(0);
        ProcessingMode::ParallelWith(2)
            .par_map(0..20, |_| counter.fetch_add(1, Ordering::SeqCst))
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_from_jobs() {
        assert_eq!(ProcessingMode::from_jobs(None), ProcessingMode::Parallel);
        assert_eq!(ProcessingMode::from_jobs(Some(1)), ProcessingMode::Sequential);
        assert_eq!(ProcessingMode::from_jobs(Some(4)), ProcessingMode::ParallelWith(4));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_zero_threads_rejected() {
        let err = ProcessingMode::ParallelWith(0).par_map(0..2, |i| i).unwrap_err();
        assert!(matches!(err, PoolError::ZeroThreads));
    }
}
