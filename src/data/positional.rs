//! Cyclical positional encoding for 5-minute traffic samples.

/// Samples per day at 5-minute resolution.
pub const SAMPLES_PER_DAY: usize = 288;

/// Samples per week at 5-minute resolution.
pub const SAMPLES_PER_WEEK: usize = 2016;

/// Daily plus weekly sine signal for each time index.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositionalEncoder;

impl PositionalEncoder {
    pub fn new() -> Self {
        Self
    }

    /// `sin(2π t / 288) + sin(2π t / 2016)` for a single index.
    pub fn at(&self, t: usize) -> f32 {
        let day = (360.0 * t as f64 / SAMPLES_PER_DAY as f64).to_radians();
        let week = (360.0 * t as f64 / SAMPLES_PER_WEEK as f64).to_radians();
        (day.sin() + week.sin()) as f32
    }

    /// Encoding for indices `0..=len`, i.e. `len + 1` values.
    pub fn encode(&self, len: usize) -> Vec<f32> {
        (0..=len).map(|t| self.at(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_is_zero() {
        let enc = PositionalEncoder::new().encode(10);
        assert_eq!(enc[0], 0.0);
    }

    #[test]
    fn test_length_is_len_plus_one() {
        assert_eq!(PositionalEncoder::new().encode(500).len(), 501);
        assert_eq!(PositionalEncoder::new().encode(0).len(), 1);
    }

    #[test]
    fn test_daily_period_up_to_weekly_drift() {
        let enc = PositionalEncoder::new().encode(4 * SAMPLES_PER_DAY);
        // One day moves the weekly term by at most 2π/7 in phase.
        let max_drift = 2.0 * (std::f32::consts::PI / 7.0).sin();
        for t in 0..SAMPLES_PER_DAY {
            let diff = (enc[t + SAMPLES_PER_DAY] - enc[t]).abs();
            assert!(diff <= max_drift + 1e-4, "t={} drift {}", t, diff);
        }
    }

    #[test]
    fn test_weekly_period_is_exact() {
        let enc = PositionalEncoder::new().encode(2 * SAMPLES_PER_WEEK);
        for t in (0..SAMPLES_PER_WEEK).step_by(97) {
            assert!((enc[t + SAMPLES_PER_WEEK] - enc[t]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_bounded() {
        let enc = PositionalEncoder::new().encode(SAMPLES_PER_WEEK);
        assert!(enc.iter().all(|v| v.abs() <= 2.0));
    }
}
