//! Graph Module
//!
//! Road-network structure for the spatial aggregation:
//! - Thresholded Gaussian kernel over sensor distances
//! - Binary symmetric adjacency
//! - Hop band masks from differences of thresholded adjacency powers

pub mod adjacency;

pub use adjacency::{row_normalize, AdjacencyBuilder, AdjacencyMatrix, HopMasks, KernelConfig};
