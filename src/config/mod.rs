//! Configuration Module
//!
//! - Dataset catalogue with fixed train/test day ranges
//! - Key-value experiment file (`file_path.<dataset>_content` / `_cites`)
//! - Model and trainer hyper-parameters

pub mod dataset;
pub mod experiment;
pub mod model;

pub use dataset::{Dataset, DayRange, DaySplit, SeriesFormat};
pub use experiment::ExperimentConfig;
pub use model::{ModelConfig, TrainerConfig};
