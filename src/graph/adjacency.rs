//! Sensor adjacency and hop-distance bands.
//!
//! Physical road distances go through a thresholded Gaussian kernel to give a
//! binary symmetric adjacency; differences of its thresholded powers then
//! split node pairs into hop bands.

use crate::core::{Error, Result};
use crate::tensor::Matrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters of the thresholded Gaussian kernel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Distances are divided by this before the kernel
    pub scale: f32,
    /// Kernel bandwidth σ²
    pub sigma2: f32,
    /// Minimum kernel weight for an edge to survive
    pub epsilon: f32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            scale: 10000.0,
            sigma2: 0.1,
            epsilon: 0.5,
        }
    }
}

/// Turns a raw distance matrix into an `AdjacencyMatrix`.
#[derive(Clone, Debug, Default)]
pub struct AdjacencyBuilder {
    pub config: KernelConfig,
}

impl AdjacencyBuilder {
    pub fn new(config: KernelConfig) -> Self {
        Self { config }
    }

    /// Kernel weights `exp(-(W/scale)² / σ²)`, zeroed below ε and on the diagonal.
    pub fn kernel_weights(&self, distances: &Matrix) -> Result<Matrix> {
        let (rows, cols) = distances.shape();
        if rows != cols {
            return Err(Error::DataFormat(format!(
                "distance matrix must be square, got {}x{}",
                rows, cols
            )));
        }

        let KernelConfig {
            scale,
            sigma2,
            epsilon,
        } = self.config;
        let mut weights = Matrix::zeros(rows, cols);
        for u in 0..rows {
            for v in 0..cols {
                if u == v {
                    continue;
                }
                let d = distances.get(u, v);
                if d < 0.0 || !d.is_finite() {
                    return Err(Error::DataFormat(format!(
                        "distance ({}, {}) must be finite and non-negative, got {}",
                        u, v, d
                    )));
                }
                let scaled = d / scale;
                let w = (-(scaled * scaled) / sigma2).exp();
                if w >= epsilon {
                    weights.set(u, v, w);
                }
            }
        }
        Ok(weights)
    }

    /// Binary symmetric adjacency: an edge in either direction is an edge in both.
    pub fn build(&self, distances: &Matrix) -> Result<AdjacencyMatrix> {
        let weights = self.kernel_weights(distances)?;
        let n = weights.rows();
        let mut adj = Matrix::zeros(n, n);
        for u in 0..n {
            for v in 0..n {
                if weights.get(u, v) > 0.0 {
                    adj.set(u, v, 1.0);
                    adj.set(v, u, 1.0);
                }
            }
        }
        let adjacency = AdjacencyMatrix { matrix: adj };
        debug!(
            nodes = n,
            edges = adjacency.edge_count(),
            "Built adjacency from distance kernel"
        );
        Ok(adjacency)
    }
}

/// `N x N` symmetric 0/1 matrix with a zero diagonal.
#[derive(Clone, Debug, PartialEq)]
pub struct AdjacencyMatrix {
    matrix: Matrix,
}

impl AdjacencyMatrix {
    /// Accept an existing 0/1 matrix after checking the invariants.
    pub fn from_dense(matrix: Matrix) -> Result<Self> {
        let (rows, cols) = matrix.shape();
        if rows != cols {
            return Err(Error::shape("adjacency", (rows, rows), (rows, cols)));
        }
        for u in 0..rows {
            if matrix.get(u, u) != 0.0 {
                return Err(Error::DataFormat(format!(
                    "adjacency diagonal must be zero at node {}",
                    u
                )));
            }
            for v in 0..cols {
                let x = matrix.get(u, v);
                if x != 0.0 && x != 1.0 {
                    return Err(Error::DataFormat(format!(
                        "adjacency entry ({}, {}) must be 0 or 1, got {}",
                        u, v, x
                    )));
                }
                if x != matrix.get(v, u) {
                    return Err(Error::DataFormat(format!(
                        "adjacency must be symmetric at ({}, {})",
                        u, v
                    )));
                }
            }
        }
        Ok(Self { matrix })
    }

    /// Undirected edge list helper.
    pub fn from_edges(num_nodes: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut matrix = Matrix::zeros(num_nodes, num_nodes);
        for &(u, v) in edges {
            if u >= num_nodes || v >= num_nodes {
                return Err(Error::DataFormat(format!(
                    "edge ({}, {}) out of range for {} nodes",
                    u, v, num_nodes
                )));
            }
            if u != v {
                matrix.set(u, v, 1.0);
                matrix.set(v, u, 1.0);
            }
        }
        Ok(Self { matrix })
    }

    pub fn num_nodes(&self) -> usize {
        self.matrix.rows()
    }

    pub fn as_matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.matrix.get(u, v) > 0.0
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        (self.matrix.sum() as usize) / 2
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.num_nodes();
        (0..n).all(|u| (0..n).all(|v| self.matrix.get(u, v) == self.matrix.get(v, u)))
    }

    /// Masks for hop bands `1..=layers`.
    ///
    /// Band 1 is the adjacency. Band `k` is `(A^k > 0) AND NOT (A^(k-1) > 0)`,
    /// each power thresholded to 0/1 before the next product. Consecutive
    /// bands never overlap; on graphs with odd and even walks between the
    /// same pair, bands further apart can.
    pub fn hop_masks(&self, layers: usize) -> Result<HopMasks> {
        let mut masks = Vec::with_capacity(layers);
        if layers == 0 {
            return Ok(HopMasks { masks });
        }

        masks.push(self.matrix.clone());
        let mut previous = self.matrix.clone();
        for _ in 2..=layers {
            let power = threshold(&previous.matmul(&self.matrix)?);
            let band = power.zip_map(&previous, |p, q| if p > 0.0 && q == 0.0 { 1.0 } else { 0.0 })?;
            masks.push(band);
            previous = power;
        }

        for (k, mask) in masks.iter().enumerate() {
            debug!(hop = k + 1, pairs = mask.sum() as usize, "Hop band");
        }
        Ok(HopMasks { masks })
    }
}

fn threshold(m: &Matrix) -> Matrix {
    m.map(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

/// Ordered hop-band masks, band `k` stored at index `k - 1`.
#[derive(Clone, Debug)]
pub struct HopMasks {
    masks: Vec<Matrix>,
}

impl HopMasks {
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Mask for hop distance `k` (1-based).
    pub fn band(&self, k: usize) -> Option<&Matrix> {
        k.checked_sub(1).and_then(|i| self.masks.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Matrix> {
        self.masks.iter()
    }

    /// Every band divided by its row's neighbour count; empty rows stay zero.
    pub fn row_normalized(&self) -> Vec<Matrix> {
        self.masks.iter().map(row_normalize).collect()
    }
}

/// Divide each row by its sum, treating an empty row's count as 1.
pub fn row_normalize(mask: &Matrix) -> Matrix {
    let sums = mask.row_sums();
    let mut out = mask.clone();
    for (r, &count) in sums.iter().enumerate() {
        let count = if count > 0.0 { count } else { 1.0 };
        for c in 0..out.cols() {
            out.set(r, c, out.get(r, c) / count);
        }
    }
    out
}
