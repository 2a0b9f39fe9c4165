//! Single dense transformation over self, hop-aggregate and latent features.

use crate::core::{Error, Result};
use crate::tensor::{Parameter, Parameterized};
use candle_core::{Device, Tensor};
use rand::Rng;

/// Spatial aggregation layer.
///
/// Holds one weight of shape `(width, (hops + 2) * width)`. The input is the
/// column concatenation `[self | hop_1 .. hop_L | latent]`, every block
/// `N x width`; the output is `relu(input · Wᵀ)`, again `N x width`.
#[derive(Debug)]
pub struct SpatialAggregationLayer {
    /// Feature width of every block
    pub width: usize,
    /// Number of hop-aggregate blocks
    pub hops: usize,
    weight: Parameter,
}

impl SpatialAggregationLayer {
    pub fn new<R: Rng + ?Sized>(
        name: &str,
        width: usize,
        hops: usize,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        let weight = Parameter::xavier(
            format!("{}.weight", name),
            width,
            (hops + 2) * width,
            rng,
            device,
        )?;
        Ok(Self {
            width,
            hops,
            weight,
        })
    }

    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    /// Combine the three feature groups for every node.
    ///
    /// `aggregates` is the `N x (hops * width)` concatenation of the hop bands.
    pub fn forward(&self, self_feats: &Tensor, aggregates: &Tensor, latent: &Tensor) -> Result<Tensor> {
        let rows = self_feats.dim(0)?;
        let expected = [
            (self_feats, self.width),
            (aggregates, self.hops * self.width),
            (latent, self.width),
        ];
        for (t, cols) in expected {
            let shape = t.dims2()?;
            if shape != (rows, cols) {
                return Err(Error::shape("spatial_aggregation", (rows, cols), shape));
            }
        }

        let combined = Tensor::cat(&[self_feats, aggregates, latent], 1)?;
        Ok(combined.matmul(&self.weight.as_tensor().t()?)?.relu()?)
    }
}

impl Parameterized for SpatialAggregationLayer {
    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weight]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Matrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn t(m: Matrix) -> Tensor {
        m.to_tensor(&Device::Cpu).unwrap()
    }

    #[test]
    fn test_weight_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = SpatialAggregationLayer::new("l", 4, 3, &mut rng, &Device::Cpu).unwrap();
        assert_eq!(layer.weight().shape(), (4, 20));
        assert_eq!(layer.num_parameters(), 80);
    }

    #[test]
    fn test_forward_shape_and_relu() {
        let mut rng = StdRng::seed_from_u64(2);
        let layer = SpatialAggregationLayer::new("l", 2, 2, &mut rng, &Device::Cpu).unwrap();
        let x = t(Matrix::filled(5, 2, 1.0));
        let agg = t(Matrix::filled(5, 4, -0.5));
        let lat = t(Matrix::zeros(5, 2));
        let out = Matrix::from_tensor(&layer.forward(&x, &agg, &lat).unwrap()).unwrap();
        assert_eq!(out.shape(), (5, 2));
        assert!(out.data().iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_forward_matches_manual_product() {
        let layer = SpatialAggregationLayer::new("l", 1, 1, &mut StdRng::seed_from_u64(0), &Device::Cpu).unwrap();
        layer
            .weight()
            .load(&Matrix::from_vec(1, 3, vec![1.0, 2.0, -1.0]).unwrap())
            .unwrap();
        let x = t(Matrix::from_vec(2, 1, vec![1.0, 3.0]).unwrap());
        let agg = t(Matrix::from_vec(2, 1, vec![0.5, 0.0]).unwrap());
        let lat = t(Matrix::from_vec(2, 1, vec![0.0, 10.0]).unwrap());
        let out = Matrix::from_tensor(&layer.forward(&x, &agg, &lat).unwrap()).unwrap();
        // row 0: 1 + 1 - 0 = 2; row 1: 3 + 0 - 10 < 0
        assert_eq!(out.data(), &[2.0, 0.0]);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let layer = SpatialAggregationLayer::new("l", 2, 2, &mut StdRng::seed_from_u64(3), &Device::Cpu).unwrap();
        let x = t(Matrix::zeros(3, 2));
        let agg = t(Matrix::zeros(3, 2));
        let lat = t(Matrix::zeros(3, 2));
        assert!(matches!(
            layer.forward(&x, &agg, &lat),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
