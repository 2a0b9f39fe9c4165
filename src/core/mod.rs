//! Core utilities and common types for SST-GNN.

pub mod error;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::*;
