//! Training Module
//!
//! Everything that updates or scores the model:
//! - Adam optimizer and step learning-rate schedule
//! - RMSE / MAE / MAPE
//! - Best-model checkpoints
//! - Epoch loop and evaluation pass

pub mod checkpoint;
pub mod metrics;
pub mod optimizer;
pub mod trainer;

pub use checkpoint::{load_snapshot, save_snapshot, CheckpointPaths, ModelSnapshot, NamedMatrix};
pub use metrics::{mae, mape, rmse, ForecastMetrics};
pub use optimizer::{Adam, AdamConfig, LearningRateSchedule};
pub use trainer::{Evaluation, Trainer, TrainingSummary};
