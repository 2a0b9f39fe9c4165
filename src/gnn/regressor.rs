//! Two-layer regression head.

use crate::core::{Error, Result};
use crate::tensor::{Matrix, Parameter, Parameterized};
use candle_core::{Device, Tensor};
use candle_nn::Module;
use rand::Rng;

/// Fully connected layer `x · Wᵀ + b` over named parameters.
#[derive(Debug)]
pub struct Linear {
    weight: Parameter,
    bias: Parameter,
    inner: candle_nn::Linear,
}

impl Linear {
    /// Xavier-uniform weight; bias uniform in `±1/sqrt(in_features)`.
    pub fn new<R: Rng + ?Sized>(
        name: &str,
        in_features: usize,
        out_features: usize,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        let bound = 1.0 / (in_features.max(1) as f32).sqrt();
        let weight = Parameter::xavier(format!("{}.weight", name), out_features, in_features, rng, device)?;
        let bias = Parameter::new(
            format!("{}.bias", name),
            &Matrix::uniform(1, out_features, bound, rng),
            device,
        )?;
        let inner = candle_nn::Linear::new(weight.as_tensor().clone(), Some(bias.as_tensor().clone()));
        Ok(Self { weight, bias, inner })
    }

    pub fn in_features(&self) -> usize {
        self.weight.shape().1
    }

    pub fn out_features(&self) -> usize {
        self.weight.shape().0
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.inner.forward(x)?)
    }
}

/// Maps fused embeddings to `pred_len` forecasts, ReLU after each layer.
#[derive(Debug)]
pub struct Regressor {
    hidden: Linear,
    output: Linear,
}

impl Regressor {
    pub fn new<R: Rng + ?Sized>(emb_size: usize, pred_len: usize, rng: &mut R, device: &Device) -> Result<Self> {
        Ok(Self {
            hidden: Linear::new("regression.0", emb_size, emb_size, rng, device)?,
            output: Linear::new("regression.1", emb_size, pred_len, rng, device)?,
        })
    }

    pub fn emb_size(&self) -> usize {
        self.hidden.in_features()
    }

    pub fn pred_len(&self) -> usize {
        self.output.out_features()
    }

    pub fn forward(&self, embeddings: &Tensor) -> Result<Tensor> {
        let width = embeddings.dim(1)?;
        if width != self.emb_size() {
            return Err(Error::ShapeMismatch {
                op: "regressor_forward",
                expected: format!("{} columns", self.emb_size()),
                actual: format!("{} columns", width),
            });
        }
        let h = self.hidden.forward(embeddings)?.relu()?;
        Ok(self.output.forward(&h)?.relu()?)
    }
}

impl Parameterized for Regressor {
    fn parameters(&self) -> Vec<&Parameter> {
        vec![
            &self.hidden.weight,
            &self.hidden.bias,
            &self.output.weight,
            &self.output.bias,
        ]
    }
}
