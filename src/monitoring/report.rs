//! Per-epoch training reports.

use crate::core::{now, Timestamp};
use crate::train::metrics::ForecastMetrics;
use serde::{Deserialize, Serialize};

/// What one epoch produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EpochReport {
    /// 1-based epoch number
    pub epoch: usize,
    /// Learning rate used during the epoch
    pub learning_rate: f32,
    /// Mean training loss over the epoch's windows
    pub train_loss: f32,
    /// Mean test loss over the test windows
    pub test_loss: f32,
    /// Metrics of this epoch's evaluation
    pub metrics: ForecastMetrics,
    /// Metrics of the best epoch so far
    pub best: ForecastMetrics,
    /// Whether this epoch set a new best test loss
    pub improved: bool,
    /// When the epoch finished
    pub finished_at: Timestamp,
}

impl EpochReport {
    pub fn new(epoch: usize, learning_rate: f32, train_loss: f32, test_loss: f32, metrics: ForecastMetrics) -> Self {
        Self {
            epoch,
            learning_rate,
            train_loss,
            test_loss,
            metrics,
            best: metrics,
            improved: false,
            finished_at: now(),
        }
    }

    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as text.
    pub fn to_text(&self) -> String {
        format!(
            "epoch {} lr {:.6} train {:.6} test {:.6} | RMSE {:.4} MAE {:.4} MAPE {:.4} | min RMSE {:.4} MAE {:.4} MAPE {:.4}{}",
            self.epoch,
            self.learning_rate,
            self.train_loss,
            self.test_loss,
            self.metrics.rmse,
            self.metrics.mae,
            self.metrics.mape,
            self.best.rmse,
            self.best.mae,
            self.best.mape,
            if self.improved { " *" } else { "" }
        )
    }
}

/// Every epoch report of a run, in order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunHistory {
    reports: Vec<EpochReport>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: EpochReport) {
        self.reports.push(report);
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn reports(&self) -> &[EpochReport] {
        &self.reports
    }

    pub fn last(&self) -> Option<&EpochReport> {
        self.reports.last()
    }

    /// Earliest epoch with the strictly smallest test loss.
    pub fn best(&self) -> Option<&EpochReport> {
        self.reports.iter().fold(None, |best: Option<&EpochReport>, r| match best {
            Some(b) if b.test_loss <= r.test_loss => Some(b),
            _ => Some(r),
        })
    }

    pub fn train_losses(&self) -> Vec<f32> {
        self.reports.iter().map(|r| r.train_loss).collect()
    }

    pub fn test_losses(&self) -> Vec<f32> {
        self.reports.iter().map(|r| r.test_loss).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(epoch: usize, test_loss: f32) -> EpochReport {
        EpochReport::new(epoch, 0.001, 1.0, test_loss, ForecastMetrics::default())
    }

    #[test]
    fn test_best_prefers_earliest_minimum() {
        let mut history = RunHistory::new();
        history.push(report(1, 3.0));
        history.push(report(2, 1.0));
        history.push(report(3, 1.0));
        history.push(report(4, 2.0));
        assert_eq!(history.best().unwrap().epoch, 2);
        assert_eq!(history.len(), 4);
        assert_eq!(history.test_losses(), vec![3.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_formats() {
        let mut r = report(7, 0.5);
        r.improved = true;
        assert!(r.to_text().starts_with("epoch 7"));
        assert!(r.to_text().ends_with('*'));
        let json = r.to_json();
        assert!(json.contains("\"epoch\":7"));
        let back: EpochReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.test_loss, 0.5);
    }

    #[test]
    fn test_empty_history() {
        assert!(RunHistory::new().best().is_none());
    }
}
