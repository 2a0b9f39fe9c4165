//! Adam optimizer and the step learning-rate schedule.

use crate::core::Result;
use candle_core::backprop::GradStore;
use candle_core::Var;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use serde::{Deserialize, Serialize};

/// Step decay: `initial` halved every `decay_every` epochs up to
/// `decay_until`, then fixed at `floor`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearningRateSchedule {
    pub initial: f32,
    pub factor: f32,
    pub decay_every: usize,
    pub decay_until: usize,
    pub floor: f32,
}

impl Default for LearningRateSchedule {
    fn default() -> Self {
        Self {
            initial: 0.001,
            factor: 0.5,
            decay_every: 8,
            decay_until: 24,
            floor: 0.0001,
        }
    }
}

impl LearningRateSchedule {
    /// A schedule that never changes.
    pub fn constant(rate: f32) -> Self {
        Self {
            initial: rate,
            factor: 1.0,
            decay_every: 1,
            decay_until: usize::MAX,
            floor: rate,
        }
    }

    /// Learning rate for a 1-based epoch.
    pub fn rate(&self, epoch: usize) -> f32 {
        if epoch > self.decay_until {
            return self.floor;
        }
        let decays = epoch.saturating_sub(1) / self.decay_every.max(1);
        self.initial * self.factor.powi(decays as i32)
    }
}

/// Adam hyper-parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdamConfig {
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

impl AdamConfig {
    /// Candle parameters for plain Adam (no decoupled weight decay).
    pub fn params(&self, lr: f32) -> ParamsAdamW {
        ParamsAdamW {
            lr: lr as f64,
            beta1: self.beta1 as f64,
            beta2: self.beta2 as f64,
            eps: self.eps as f64,
            weight_decay: 0.0,
        }
    }
}

/// Adam over a fixed set of vars; moments persist across steps.
pub struct Adam {
    inner: AdamW,
    steps: u64,
}

impl Adam {
    pub fn new(vars: Vec<Var>, config: &AdamConfig) -> Result<Self> {
        let initial = LearningRateSchedule::default().initial;
        Ok(Self {
            inner: AdamW::new(vars, config.params(initial))?,
            steps: 0,
        })
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn learning_rate(&self) -> f32 {
        self.inner.learning_rate() as f32
    }

    /// Apply one update at rate `lr` from `grads`.
    pub fn step(&mut self, grads: &GradStore, lr: f32) -> Result<()> {
        self.inner.set_learning_rate(lr as f64);
        self.inner.step(grads)?;
        self.steps += 1;
        Ok(())
    }
}
