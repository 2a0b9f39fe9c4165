//! Sliding windows over per-sensor series.
//!
//! A window starting at offset `st` holds, per node, the readings at the same
//! time of day over `history_days` consecutive days followed by the
//! `pred_len` readings right after the last historical one.

use crate::core::{Error, Result};
use crate::data::positional::PositionalEncoder;
use crate::tensor::Matrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-sensor scalar time series, `N` sensors by `P` timestamps.
#[derive(Clone, Debug)]
pub struct SensorSeries {
    data: Matrix,
}

impl SensorSeries {
    /// Wrap an `N x P` matrix (row per sensor).
    pub fn new(data: Matrix) -> Self {
        Self { data }
    }

    /// Build from one vector per sensor; all must share a length.
    pub fn from_sensor_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let data = Matrix::from_rows(rows).map_err(|_| {
            Error::DataFormat("all sensors must share the same timestamp index".to_string())
        })?;
        Ok(Self { data })
    }

    pub fn num_sensors(&self) -> usize {
        self.data.rows()
    }

    pub fn len(&self) -> usize {
        self.data.cols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn reading(&self, sensor: usize, t: usize) -> f32 {
        self.data.get(sensor, t)
    }

    pub fn as_matrix(&self) -> &Matrix {
        &self.data
    }
}

/// Which days to slice and how long each window is.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowConfig {
    /// First day of the range (1-based, inclusive)
    pub start_day: usize,
    /// Last day of the range (1-based, inclusive)
    pub end_day: usize,
    /// Samples per hour (12 for 5-minute data)
    pub hourly_samples: usize,
    /// Number of historical days per window
    pub history_days: usize,
    /// Number of future targets per window
    pub pred_len: usize,
}

impl WindowConfig {
    pub fn samples_per_day(&self) -> usize {
        24 * self.hourly_samples
    }

    fn validate(&self) -> Result<()> {
        if self.start_day == 0 || self.end_day < self.start_day {
            return Err(Error::Config(format!(
                "invalid day range {}..={}",
                self.start_day, self.end_day
            )));
        }
        if self.hourly_samples == 0 || self.history_days == 0 || self.pred_len == 0 {
            return Err(Error::Config(
                "hourly samples, history days and prediction length must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Zero-based day blocks the scan visits.
    fn day_blocks(&self) -> std::ops::Range<usize> {
        let end = (self.end_day + 1).saturating_sub(self.history_days);
        (self.start_day - 1)..end.max(self.start_day - 1)
    }

    /// Exclusive upper bound on start offsets whose targets stay in range.
    fn start_limit(&self, series_len: usize) -> usize {
        series_len.saturating_sub(self.pred_len + (self.history_days - 1) * self.samples_per_day())
    }

    /// Number of windows `WindowedDataset::build` yields for a series of `series_len`.
    pub fn expected_window_count(&self, series_len: usize) -> usize {
        let spd = self.samples_per_day();
        let limit = self.start_limit(series_len);
        self.day_blocks()
            .map(|idx| limit.saturating_sub(idx * spd).min(spd))
            .sum()
    }
}

/// One training/evaluation sample.
#[derive(Clone, Debug)]
pub struct Window {
    /// Start offset in the series
    pub start: usize,
    /// `N x (history_days + pred_len)` readings
    values: Matrix,
    /// Positional encoding of each historical sample
    positions: Vec<f32>,
}

impl Window {
    pub fn values(&self) -> &Matrix {
        &self.values
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn num_nodes(&self) -> usize {
        self.values.rows()
    }

    pub fn history_len(&self) -> usize {
        self.positions.len()
    }

    /// Historical readings, `N x history_days`.
    pub fn history(&self) -> Result<Matrix> {
        self.values.slice_cols(0, self.history_len())
    }

    /// Forecast targets, `N x pred_len`.
    pub fn targets(&self) -> Result<Matrix> {
        self.values.slice_cols(self.history_len(), self.values.cols())
    }

    /// Positional encoding columns `start..end`, repeated for every node.
    pub fn positional_block(&self, start: usize, end: usize) -> Result<Matrix> {
        if start > end || end > self.positions.len() {
            return Err(Error::ShapeMismatch {
                op: "positional_block",
                expected: format!("range within 0..{}", self.positions.len()),
                actual: format!("{}..{}", start, end),
            });
        }
        let row = &self.positions[start..end];
        let mut data = Vec::with_capacity(self.num_nodes() * row.len());
        for _ in 0..self.num_nodes() {
            data.extend_from_slice(row);
        }
        Matrix::from_vec(self.num_nodes(), row.len(), data)
    }
}

/// Ordered windows cut from one day range of a series.
#[derive(Clone, Debug)]
pub struct WindowedDataset {
    windows: Vec<Window>,
    history_days: usize,
    pred_len: usize,
}

impl WindowedDataset {
    /// Slice `series` into windows.
    ///
    /// Inside a day block the scan stops at the first start offset whose
    /// targets would run past the series; the rest of that block is dropped.
    pub fn build(series: &SensorSeries, config: &WindowConfig) -> Result<Self> {
        config.validate()?;

        let spd = config.samples_per_day();
        let day = config.history_days;
        let len = series.len();
        let nodes = series.num_sensors();
        let positional = PositionalEncoder::new().encode(len);

        let mut windows = Vec::new();
        for idx in config.day_blocks() {
            for st in idx * spd..(idx + 1) * spd {
                let last = st + (day - 1) * spd;
                if last + config.pred_len >= len {
                    break;
                }

                let mut values = Vec::with_capacity(nodes * (day + config.pred_len));
                for nd in 0..nodes {
                    for d in 0..day {
                        values.push(series.reading(nd, st + d * spd));
                    }
                    for p in 1..=config.pred_len {
                        values.push(series.reading(nd, last + p));
                    }
                }

                let positions = (0..day).map(|d| positional[st + d * spd]).collect();
                windows.push(Window {
                    start: st,
                    values: Matrix::from_vec(nodes, day + config.pred_len, values)?,
                    positions,
                });
            }
        }

        debug!(
            start_day = config.start_day,
            end_day = config.end_day,
            windows = windows.len(),
            "Windowed dataset built"
        );

        Ok(Self {
            windows,
            history_days: day,
            pred_len: config.pred_len,
        })
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Window> {
        self.windows.get(i)
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn history_days(&self) -> usize {
        self.history_days
    }

    pub fn pred_len(&self) -> usize {
        self.pred_len
    }

    pub fn num_nodes(&self) -> usize {
        self.windows.first().map(|w| w.num_nodes()).unwrap_or(0)
    }

    /// Keep only the first `n` windows.
    pub fn truncate(&mut self, n: usize) {
        self.windows.truncate(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reading at `(sensor, t)` is `1000 * sensor + t`.
    fn ramp(sensors: usize, len: usize) -> SensorSeries {
        let rows: Vec<Vec<f32>> = (0..sensors)
            .map(|s| (0..len).map(|t| (1000 * s + t) as f32).collect())
            .collect();
        SensorSeries::from_sensor_rows(&rows).unwrap()
    }

    fn hourly_config() -> WindowConfig {
        WindowConfig {
            start_day: 1,
            end_day: 5,
            hourly_samples: 1,
            history_days: 2,
            pred_len: 3,
        }
    }

    #[test]
    fn test_window_shape() {
        let ds = WindowedDataset::build(&ramp(3, 24 * 5), &hourly_config()).unwrap();
        assert!(!ds.is_empty());
        for w in ds.windows() {
            assert_eq!(w.values().shape(), (3, 2 + 3));
            assert_eq!(w.positions().len(), 2);
        }
    }

    #[test]
    fn test_window_contents() {
        let ds = WindowedDataset::build(&ramp(2, 24 * 5), &hourly_config()).unwrap();
        let w = ds.get(5).unwrap();
        assert_eq!(w.start, 5);
        // history: t=5, t=29; targets: t=30, 31, 32
        assert_eq!(w.values().row(0), &[5.0, 29.0, 30.0, 31.0, 32.0]);
        assert_eq!(w.values().row(1), &[1005.0, 1029.0, 1030.0, 1031.0, 1032.0]);
        assert_eq!(w.history().unwrap().row(1), &[1005.0, 1029.0]);
        assert_eq!(w.targets().unwrap().row(0), &[30.0, 31.0, 32.0]);

        let enc = PositionalEncoder::new();
        assert_eq!(w.positions(), &[enc.at(5), enc.at(29)]);
    }

    #[test]
    fn test_count_matches_closed_form_and_drops_partial_block() {
        let config = hourly_config();
        let series = ramp(2, 24 * 5);
        let ds = WindowedDataset::build(&series, &config).unwrap();
        // blocks 0..4; start limit = 120 - 3 - 24 = 93 => 24 + 24 + 24 + 21
        assert_eq!(config.expected_window_count(series.len()), 93);
        assert_eq!(ds.len(), 93);
        assert_eq!(ds.windows().last().unwrap().start, 92);
    }

    #[test]
    fn test_count_closed_form_for_various_lengths() {
        let config = WindowConfig {
            start_day: 2,
            end_day: 6,
            hourly_samples: 1,
            history_days: 3,
            pred_len: 2,
        };
        for len in [30, 72, 97, 100, 130, 200] {
            let series = ramp(1, len);
            let ds = WindowedDataset::build(&series, &config).unwrap();
            assert_eq!(ds.len(), config.expected_window_count(len), "len {}", len);
        }
    }

    #[test]
    fn test_range_shorter_than_history_is_empty() {
        let config = WindowConfig {
            start_day: 3,
            end_day: 3,
            history_days: 2,
            ..hourly_config()
        };
        let ds = WindowedDataset::build(&ramp(1, 24 * 10), &config).unwrap();
        assert!(ds.is_empty());
    }

    #[test]
    fn test_positional_block_broadcasts() {
        let ds = WindowedDataset::build(&ramp(3, 24 * 5), &hourly_config()).unwrap();
        let w = ds.get(0).unwrap();
        let block = w.positional_block(0, 2).unwrap();
        assert_eq!(block.shape(), (3, 2));
        assert_eq!(block.row(0), block.row(2));
        assert!(w.positional_block(1, 3).is_err());
    }

    #[test]
    fn test_invalid_config() {
        let config = WindowConfig {
            start_day: 0,
            ..hourly_config()
        };
        assert!(WindowedDataset::build(&ramp(1, 48), &config).is_err());
    }

    #[test]
    fn test_ragged_sensors_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            SensorSeries::from_sensor_rows(&rows),
            Err(Error::DataFormat(_))
        ));
    }
}
