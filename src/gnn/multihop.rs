//! One-round multi-hop spatial model.

use crate::core::Result;
use crate::gnn::layer::SpatialAggregationLayer;
use crate::graph::HopMasks;
use crate::tensor::{Parameter, Parameterized};
use candle_core::{Device, Tensor};
use rand::Rng;
use std::sync::Arc;

/// Row-normalized hop-band masks on the model device, shared by every
/// sub-model of a forecaster.
#[derive(Clone, Debug)]
pub struct NormalizedMasks {
    masks: Arc<Vec<Tensor>>,
    num_nodes: usize,
}

impl NormalizedMasks {
    pub fn new(masks: &HopMasks, device: &Device) -> Result<Self> {
        let normalized = masks.row_normalized();
        let num_nodes = normalized.first().map(|m| m.rows()).unwrap_or(0);
        let masks = normalized
            .iter()
            .map(|m| m.to_tensor(device))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            masks: Arc::new(masks),
            num_nodes,
        })
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Normalized mask for hop `k` (1-based).
    pub fn band(&self, k: usize) -> Option<&Tensor> {
        k.checked_sub(1).and_then(|i| self.masks.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.masks.iter()
    }
}

/// Inputs of one `MultiHopGnn::forward` call.
#[derive(Clone, Copy, Debug)]
pub struct GnnInput<'a> {
    /// `N x width` raw node features
    pub raw_features: &'a Tensor,
    /// `N x width` running latent carried from the previous timestamp
    pub pre_latent: &'a Tensor,
}

/// Aggregates every hop band in parallel and combines them in a single layer.
#[derive(Debug)]
pub struct MultiHopGnn {
    masks: NormalizedMasks,
    layer: SpatialAggregationLayer,
}

impl MultiHopGnn {
    pub fn new<R: Rng + ?Sized>(
        name: &str,
        masks: NormalizedMasks,
        width: usize,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        let layer = SpatialAggregationLayer::new(&format!("{}.layer", name), width, masks.len(), rng, device)?;
        Ok(Self { masks, layer })
    }

    pub fn hops(&self) -> usize {
        self.masks.len()
    }

    pub fn width(&self) -> usize {
        self.layer.width
    }

    pub fn masks(&self) -> &NormalizedMasks {
        &self.masks
    }

    /// Mean of the `features` of each node's neighbours in one band.
    ///
    /// Nodes with no neighbour in the band get an all-zero row.
    pub fn aggregate(&self, mask: &Tensor, features: &Tensor) -> Result<Tensor> {
        Ok(mask.matmul(features)?)
    }

    pub fn forward(&self, input: &GnnInput<'_>) -> Result<Tensor> {
        let aggregates = self
            .masks
            .iter()
            .map(|mask| self.aggregate(mask, input.raw_features))
            .collect::<Result<Vec<_>>>()?;
        let aggregates = Tensor::cat(&aggregates, 1)?;

        self.layer
            .forward(input.raw_features, &aggregates, input.pre_latent)
    }
}

impl Parameterized for MultiHopGnn {
    fn parameters(&self) -> Vec<&Parameter> {
        self.layer.parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::graph::AdjacencyMatrix;
    use crate::tensor::Matrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn masks_with_isolated_node() -> NormalizedMasks {
        // 0-1-2 path plus node 3 with no edges
        let adj = AdjacencyMatrix::from_edges(4, &[(0, 1), (1, 2)]).unwrap();
        NormalizedMasks::new(&adj.hop_masks(2).unwrap(), &Device::Cpu).unwrap()
    }

    fn gnn(masks: &NormalizedMasks, width: usize, seed: u64) -> MultiHopGnn {
        MultiHopGnn::new("g", masks.clone(), width, &mut StdRng::seed_from_u64(seed), &Device::Cpu).unwrap()
    }

    fn t(m: Matrix) -> Tensor {
        m.to_tensor(&Device::Cpu).unwrap()
    }

    #[test]
    fn test_aggregate_is_neighbour_mean() {
        let masks = masks_with_isolated_node();
        let gnn = gnn(&masks, 1, 0);
        let x = t(Matrix::from_vec(4, 1, vec![2.0, 4.0, 6.0, 8.0]).unwrap());

        let hop1 = gnn.aggregate(masks.band(1).unwrap(), &x).unwrap();
        assert_eq!(Matrix::from_tensor(&hop1).unwrap().data(), &[4.0, 4.0, 4.0, 0.0]);

        // band 2 of the path: {0, 2} for the ends, the middle node itself
        let hop2 = gnn.aggregate(masks.band(2).unwrap(), &x).unwrap();
        assert_eq!(Matrix::from_tensor(&hop2).unwrap().data(), &[4.0, 4.0, 4.0, 0.0]);
    }

    #[test]
    fn test_isolated_node_aggregate_is_zero_not_nan() {
        let masks = masks_with_isolated_node();
        let gnn = gnn(&masks, 2, 0);
        let x = t(Matrix::filled(4, 2, 3.0));
        for mask in masks.iter() {
            let agg = Matrix::from_tensor(&gnn.aggregate(mask, &x).unwrap()).unwrap();
            assert!(agg.is_finite());
            assert_eq!(agg.row(3), &[0.0, 0.0]);
        }
    }

    #[test]
    fn test_forward_shape() {
        let masks = masks_with_isolated_node();
        let gnn = gnn(&masks, 3, 5);
        let raw = t(Matrix::filled(4, 3, 1.0));
        let latent = t(Matrix::zeros(4, 3));
        let out = gnn
            .forward(&GnnInput {
                raw_features: &raw,
                pre_latent: &latent,
            })
            .unwrap();
        assert_eq!(out.dims2().unwrap(), (4, 3));
        assert_eq!(gnn.parameters()[0].shape(), (3, 12));
        assert_eq!(masks.num_nodes(), 4);
    }

    #[test]
    fn test_forward_rejects_wrong_latent_width() {
        let masks = masks_with_isolated_node();
        let gnn = gnn(&masks, 2, 5);
        let raw = t(Matrix::zeros(4, 2));
        let latent = t(Matrix::zeros(4, 1));
        let input = GnnInput {
            raw_features: &raw,
            pre_latent: &latent,
        };
        assert!(matches!(gnn.forward(&input), Err(Error::ShapeMismatch { .. })));
    }
}
