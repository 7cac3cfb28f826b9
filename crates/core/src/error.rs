//! Error types for VBET

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for VBET operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Grid mismatch: {raster} differs from {reference} in {property} ({detail})")]
    GridMismatch {
        reference: String,
        raster: String,
        property: &'static str,
        detail: String,
    },

    #[error("No qualifying network features ({total} features read, allowed reach codes: {allowed})")]
    EmptyNetwork { total: usize, allowed: String },

    #[error("Invalid geometry in layer {layer}: {reason}")]
    InvalidGeometry { layer: String, reason: String },

    #[error("Cannot reproject from {from} to {to}: {reason}")]
    Reprojection { from: String, to: String, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an `std::io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// A file that exists but cannot be decoded.
    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable classification used by run manifests and exit reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::GridMismatch { .. } => ErrorKind::GridMismatch,
            Error::EmptyNetwork { .. } => ErrorKind::EmptyNetwork,
            Error::InvalidGeometry { .. } => ErrorKind::InvalidGeometry,
            Error::Io { .. } | Error::Format { .. } | Error::UnsupportedDataType(_) => {
                ErrorKind::IoFailure
            }
            Error::Reprojection { .. } | Error::InvalidParameter { .. } => ErrorKind::Config,
            Error::InvalidDimensions { .. }
            | Error::IndexOutOfBounds { .. }
            | Error::SizeMismatch { .. }
            | Error::Algorithm(_)
            | Error::Other(_) => ErrorKind::Internal,
        }
    }
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    GridMismatch,
    EmptyNetwork,
    InvalidGeometry,
    IoFailure,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::GridMismatch => "GridMismatchError",
            ErrorKind::EmptyNetwork => "EmptyNetworkError",
            ErrorKind::InvalidGeometry => "InvalidGeometryError",
            ErrorKind::IoFailure => "IOFailure",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

/// Result type alias for VBET operations
pub type Result<T> = std::result::Result<T, Error>;
