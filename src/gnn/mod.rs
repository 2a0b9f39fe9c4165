//! Graph Neural Network (GNN) Module
//!
//! The forecasting model:
//! - Spatial aggregation layer over self, hop-band and latent features
//! - Multi-hop GNN with one parallel aggregate per hop band
//! - Combined historical/current forecaster with recurrent fusion
//! - Regression head

pub mod forecaster;
pub mod layer;
pub mod multihop;
pub mod regressor;

pub use forecaster::{CombinedForecaster, ForecasterOutput};
pub use layer::SpatialAggregationLayer;
pub use multihop::{GnnInput, MultiHopGnn, NormalizedMasks};
pub use regressor::{Linear, Regressor};
