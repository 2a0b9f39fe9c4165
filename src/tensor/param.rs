//! Trainable parameters and the `Parameterized` seam used by the optimizer.

use crate::core::{Error, Result};
use crate::tensor::matrix::Matrix;
use candle_core::backprop::GradStore;
use candle_core::{Device, Tensor, Var};
use rand::Rng;

/// A named weight matrix held in a candle `Var`.
#[derive(Clone, Debug)]
pub struct Parameter {
    name: String,
    shape: (usize, usize),
    var: Var,
}

impl Parameter {
    /// Wrap an initial value. Names must be unique across a model pair.
    pub fn new(name: impl Into<String>, value: &Matrix, device: &Device) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            shape: value.shape(),
            var: Var::from_tensor(&value.to_tensor(device)?)?,
        })
    }

    /// Xavier-uniform initialised weight of shape `rows x cols`.
    pub fn xavier<R: Rng + ?Sized>(
        name: impl Into<String>,
        rows: usize,
        cols: usize,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        Self::new(name, &Matrix::xavier_uniform(rows, cols, rng), device)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn var(&self) -> &Var {
        &self.var
    }

    pub fn as_tensor(&self) -> &Tensor {
        self.var.as_tensor()
    }

    /// Host copy of the current value.
    pub fn value(&self) -> Result<Matrix> {
        Matrix::from_tensor(self.as_tensor())
    }

    /// Overwrite the value in place, keeping the shape.
    pub fn load(&self, value: &Matrix) -> Result<()> {
        if value.shape() != self.shape {
            return Err(Error::shape("load_parameter", self.shape, value.shape()));
        }
        self.var.set(&value.to_tensor(self.var.device())?)?;
        Ok(())
    }
}

/// Anything that owns trainable parameters.
pub trait Parameterized {
    fn parameters(&self) -> Vec<&Parameter>;

    fn num_parameters(&self) -> usize {
        self.parameters()
            .iter()
            .map(|p| p.shape().0 * p.shape().1)
            .sum()
    }

    /// Vars handed to the optimizer.
    fn vars(&self) -> Vec<Var> {
        self.parameters().iter().map(|p| p.var().clone()).collect()
    }

    /// L2 norm over this module's entries of `grads`.
    fn grad_norm(&self, grads: &GradStore) -> Result<f32> {
        let mut total = 0.0f32;
        for p in self.parameters() {
            if let Some(g) = grads.get(p.as_tensor()) {
                total += g.sqr()?.sum_all()?.to_scalar::<f32>()?;
            }
        }
        Ok(total.sqrt())
    }

    /// Rescale this module's gradients so their joint L2 norm is at most
    /// `max_norm`. Returns the norm before clipping.
    fn clip_grad_norm(&self, grads: &mut GradStore, max_norm: f32) -> Result<f32> {
        let total = self.grad_norm(grads)?;
        let coef = max_norm / (total + 1e-6);
        if coef < 1.0 {
            for p in self.parameters() {
                let scaled = match grads.get(p.as_tensor()) {
                    Some(g) => g.affine(coef as f64, 0.0)?,
                    None => continue,
                };
                grads.insert(p.as_tensor(), scaled);
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair {
        a: Parameter,
        b: Parameter,
    }

    impl Parameterized for Pair {
        fn parameters(&self) -> Vec<&Parameter> {
            vec![&self.a, &self.b]
        }
    }

    fn pair() -> Pair {
        let device = Device::Cpu;
        Pair {
            a: Parameter::new("a", &Matrix::filled(1, 1, 1.0), &device).unwrap(),
            b: Parameter::new("b", &Matrix::filled(1, 2, 1.0), &device).unwrap(),
        }
    }

    /// Gradients `3` for `a` and `[4, 0]` for `b`, joint norm 5.
    fn grads(p: &Pair) -> GradStore {
        let mask = Tensor::new(&[[1f32, 0.0]], &Device::Cpu).unwrap();
        let la = p.a.as_tensor().affine(3.0, 0.0).unwrap().sum_all().unwrap();
        let lb = p.b.as_tensor().mul(&mask).unwrap().affine(4.0, 0.0).unwrap().sum_all().unwrap();
        la.add(&lb).unwrap().backward().unwrap()
    }

    #[test]
    fn test_clip_grad_norm() {
        let p = pair();
        let mut g = grads(&p);
        let before = p.clip_grad_norm(&mut g, 1.0).unwrap();
        assert!((before - 5.0).abs() < 1e-5);
        assert!((p.grad_norm(&g).unwrap() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_clip_leaves_small_gradients() {
        let p = pair();
        let mut g = grads(&p);
        p.clip_grad_norm(&mut g, 10.0).unwrap();
        let gb = g.get(p.b.as_tensor()).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(gb, vec![vec![4.0, 0.0]]);
    }

    #[test]
    fn test_load_rejects_wrong_shape() {
        let p = Parameter::new("w", &Matrix::zeros(2, 2), &Device::Cpu).unwrap();
        assert!(matches!(
            p.load(&Matrix::zeros(2, 3)),
            Err(Error::ShapeMismatch { .. })
        ));
        p.load(&Matrix::filled(2, 2, 1.0)).unwrap();
        assert_eq!(p.value().unwrap().sum(), 4.0);
    }

    #[test]
    fn test_num_parameters() {
        let p = pair();
        assert_eq!(p.num_parameters(), 3);
        assert_eq!(p.vars().len(), 2);
    }
}
