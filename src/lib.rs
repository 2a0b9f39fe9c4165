//! # SST-GNN - Spatio-Temporal Graph Neural Network for traffic forecasting
//!
//! Multi-horizon speed forecasting on road-sensor networks:
//! - **Graph**: thresholded Gaussian-kernel adjacency and power-difference hop bands
//! - **Data**: same-time-of-day sliding windows with cyclical positions
//! - **GNN**: multi-hop spatial model, two-branch temporal fusion, regressor
//! - **Train**: candle autograd, Adam, step learning-rate decay, best-model checkpoints
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sstgnn::config::{Dataset, ExperimentConfig, ModelConfig, TrainerConfig};
//! use sstgnn::data::DataLoader;
//! use sstgnn::train::Trainer;
//!
//! fn main() -> sstgnn::Result<()> {
//!     let config = ExperimentConfig::from_file("experiments.json")?;
//!     let model = ModelConfig::default();
//!     let data = DataLoader::new(Dataset::PeMSD7, &model).load(&config)?;
//!     let mut trainer = Trainer::new(model, TrainerConfig::default(), Dataset::PeMSD7, data)?;
//!     let summary = trainer.run()?;
//!     println!("best test loss {}", summary.best_test_loss);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod data;
pub mod gnn;
pub mod graph;
pub mod monitoring;
pub mod tensor;
pub mod train;

pub use core::error::{Error, Result};
