//! Forecast error metrics.

use serde::{Deserialize, Serialize};

/// Root mean squared error.
pub fn rmse(predictions: &[f32], labels: &[f32]) -> f32 {
    let n = predictions.len().min(labels.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = predictions
        .iter()
        .zip(labels)
        .map(|(p, y)| {
            let d = (*p - *y) as f64;
            d * d
        })
        .sum();
    (sum / n as f64).sqrt() as f32
}

/// Mean absolute error.
pub fn mae(predictions: &[f32], labels: &[f32]) -> f32 {
    let n = predictions.len().min(labels.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = predictions
        .iter()
        .zip(labels)
        .map(|(p, y)| (*p - *y).abs() as f64)
        .sum();
    (sum / n as f64) as f32
}

/// Mean absolute percentage error, in percent.
///
/// A zero label divides by zero and yields `inf` or `NaN`.
pub fn mape(predictions: &[f32], labels: &[f32]) -> f32 {
    let n = predictions.len().min(labels.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = predictions
        .iter()
        .zip(labels)
        .map(|(p, y)| ((*y - *p) as f64 / *y as f64).abs())
        .sum();
    (sum / n as f64 * 100.0) as f32
}

/// RMSE, MAE and MAPE over one evaluation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub rmse: f32,
    pub mae: f32,
    pub mape: f32,
}

impl ForecastMetrics {
    pub fn compute(predictions: &[f32], labels: &[f32]) -> Self {
        Self {
            rmse: rmse(predictions, labels),
            mae: mae(predictions, labels),
            mape: mape(predictions, labels),
        }
    }
}
