//! Error types for SST-GNN.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for SST-GNN operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading data, building or training the model.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Data errors
    #[error("Data format error: {0}")]
    DataFormat(String),

    #[error("Adjacency file missing: {}", .0.display())]
    AdjacencyFileMissing(PathBuf),

    #[error("Sensor series file missing: {}", .0.display())]
    SeriesFileMissing(PathBuf),

    // Tensor errors
    #[error("Shape mismatch in {op}: expected {expected}, got {actual}")]
    ShapeMismatch {
        op: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    // Training errors
    #[error("Non-finite loss at epoch {epoch}, window {window}")]
    NonFiniteLoss { epoch: usize, window: usize },

    // Checkpoint errors
    #[error("Checkpoint I/O error: {0}")]
    CheckpointIo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error family, for callers that only care which stage failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    DataFormat,
    ShapeMismatch,
    Tensor,
    Training,
    CheckpointIo,
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::DataFormat => write!(f, "data-format"),
            ErrorCategory::ShapeMismatch => write!(f, "shape-mismatch"),
            ErrorCategory::Tensor => write!(f, "tensor"),
            ErrorCategory::Training => write!(f, "training"),
            ErrorCategory::CheckpointIo => write!(f, "checkpoint-io"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

impl Error {
    /// Build a shape mismatch error from two `rows x cols` pairs.
    pub fn shape(op: &'static str, expected: (usize, usize), actual: (usize, usize)) -> Self {
        Error::ShapeMismatch {
            op,
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }

    /// The family this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,
            Error::DataFormat(_)
            | Error::AdjacencyFileMissing(_)
            | Error::SeriesFileMissing(_) => ErrorCategory::DataFormat,
            Error::ShapeMismatch { .. } => ErrorCategory::ShapeMismatch,
            Error::Tensor(_) => ErrorCategory::Tensor,
            Error::NonFiniteLoss { .. } => ErrorCategory::Training,
            Error::CheckpointIo(_) => ErrorCategory::CheckpointIo,
            Error::Io(_) => ErrorCategory::Io,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::CheckpointIo(err.to_string())
    }
}
