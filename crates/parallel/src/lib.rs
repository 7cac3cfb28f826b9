//! # VBET Parallel
//!
//! Processing modes for running independent units of work, such as the
//! watershed jobs of a batch, on a bounded worker pool.
//!
//! Without the `parallel` feature every mode runs sequentially.

pub mod strategy;

pub use strategy::{num_cpus, ParallelStrategy, PoolError, ProcessingMode};
