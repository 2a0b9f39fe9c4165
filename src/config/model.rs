//! Model and trainer hyper-parameters.

use crate::core::{ComputeDevice, Error, Result};
use crate::train::optimizer::LearningRateSchedule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shape of the combined forecaster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of hop bands `L`
    pub hop_layers: usize,
    /// Number of fused timestamps `T`
    pub num_timestamps: usize,
    /// Historical samples per window (`day`); also the embedding width
    pub history_len: usize,
    /// Forecast horizon in 5-minute steps
    pub pred_len: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hop_layers: 3,
            num_timestamps: 12,
            history_len: 8,
            pred_len: 9,
        }
    }
}

impl ModelConfig {
    /// Per-node embedding width (`history_len`).
    pub fn embedding_width(&self) -> usize {
        self.history_len
    }

    /// Width of the fused embedding fed to the regressor, `T * width`.
    pub fn fused_width(&self) -> usize {
        self.num_timestamps * self.embedding_width()
    }

    /// Forecast horizon in minutes.
    pub fn horizon_minutes(&self) -> usize {
        self.pred_len * 5
    }

    pub fn validate(&self) -> Result<()> {
        if self.hop_layers == 0 {
            return Err(Error::Config("hop_layers must be at least 1".to_string()));
        }
        if self.num_timestamps == 0 {
            return Err(Error::Config("num_timestamps must be at least 1".to_string()));
        }
        if self.history_len < 2 {
            return Err(Error::Config(
                "history_len must be at least 2 (historical and current branches)".to_string(),
            ));
        }
        if self.pred_len == 0 {
            return Err(Error::Config("pred_len must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Check CLI-style input/output widths against the history length.
    pub fn check_widths(&self, input_size: usize, out_size: usize) -> Result<()> {
        if input_size != self.history_len || out_size != self.history_len {
            return Err(Error::Config(format!(
                "input_size ({}) and out_size ({}) must both equal the history length ({})",
                input_size, out_size, self.history_len
            )));
        }
        Ok(())
    }
}

/// Training-loop settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Number of epochs
    pub epochs: usize,
    /// Nodes per batch
    pub node_batch_size: usize,
    /// Seed for initialisation and window order
    pub seed: u64,
    /// Max L2 norm of each sub-model's gradients
    pub clip_norm: f32,
    /// Learning-rate schedule
    pub schedule: LearningRateSchedule,
    /// Write checkpoints when the test loss improves
    pub save_checkpoints: bool,
    /// Root directory for checkpoints
    pub results_dir: PathBuf,
    /// Cap on windows per pass, for quick debugging runs
    pub window_limit: Option<usize>,
    /// Requested compute device
    pub device: ComputeDevice,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            node_batch_size: 512,
            seed: 42,
            clip_norm: 5.0,
            schedule: LearningRateSchedule::default(),
            save_checkpoints: false,
            results_dir: PathBuf::from("results"),
            window_limit: None,
            device: ComputeDevice::Cpu,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.node_batch_size == 0 {
            return Err(Error::Config("node_batch_size must be positive".to_string()));
        }
        if !(self.clip_norm > 0.0) {
            return Err(Error::Config("clip_norm must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let m = ModelConfig::default();
        assert_eq!(m.fused_width(), 96);
        assert_eq!(m.horizon_minutes(), 45);
        assert!(m.validate().is_ok());

        let t = TrainerConfig::default();
        assert_eq!(t.node_batch_size, 512);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_invalid_model() {
        let m = ModelConfig {
            history_len: 1,
            ..Default::default()
        };
        assert!(matches!(m.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_width_check() {
        let m = ModelConfig::default();
        assert!(m.check_widths(8, 8).is_ok());
        assert!(m.check_widths(8, 16).is_err());
    }

    #[test]
    fn test_invalid_trainer() {
        let t = TrainerConfig {
            node_batch_size: 0,
            ..Default::default()
        };
        assert!(t.validate().is_err());
    }
}
