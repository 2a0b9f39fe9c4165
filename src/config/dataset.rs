//! Supported PeMS datasets and their fixed day splits.

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a dataset stores its sensor readings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesFormat {
    /// One line per timestamp, one comma-separated value per sensor
    Csv,
    /// `(timestamps, sensors, channels)` array; one channel holds the reading
    Npy { channel: usize },
}

/// Inclusive, 1-based day range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub start: usize,
    pub end: usize,
}

/// Train and test day ranges of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySplit {
    pub train: DayRange,
    pub test: DayRange,
}

/// Known traffic datasets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    PeMSD7,
    PeMSD8,
    PeMSD4,
}

impl Dataset {
    pub fn all() -> [Dataset; 3] {
        [Dataset::PeMSD7, Dataset::PeMSD8, Dataset::PeMSD4]
    }

    /// Name used in config keys and result paths.
    pub fn name(&self) -> &'static str {
        match self {
            Dataset::PeMSD7 => "PeMSD7",
            Dataset::PeMSD8 => "PeMSD8",
            Dataset::PeMSD4 => "PeMSD4",
        }
    }

    pub fn split(&self) -> DaySplit {
        let (train, test) = match self {
            Dataset::PeMSD7 => ((1, 22), (23, 44)),
            Dataset::PeMSD8 => ((1, 50), (51, 62)),
            Dataset::PeMSD4 => ((1, 47), (48, 58)),
        };
        DaySplit {
            train: DayRange {
                start: train.0,
                end: train.1,
            },
            test: DayRange {
                start: test.0,
                end: test.1,
            },
        }
    }

    pub fn series_format(&self) -> SeriesFormat {
        match self {
            Dataset::PeMSD7 => SeriesFormat::Csv,
            Dataset::PeMSD8 | Dataset::PeMSD4 => SeriesFormat::Npy { channel: 2 },
        }
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dataset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Dataset::all()
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown dataset '{}', expected one of PeMSD7, PeMSD8, PeMSD4",
                    s
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for ds in Dataset::all() {
            assert_eq!(ds.name().parse::<Dataset>().unwrap(), ds);
        }
    }

    #[test]
    fn test_unknown_dataset() {
        let err = "pemsd7".parse::<Dataset>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_splits() {
        let split = Dataset::PeMSD7.split();
        assert_eq!(split.train, DayRange { start: 1, end: 22 });
        assert_eq!(split.test, DayRange { start: 23, end: 44 });
        assert_eq!(Dataset::PeMSD8.split().test.end, 62);
        assert_eq!(Dataset::PeMSD4.split().train.end, 47);
    }

    #[test]
    fn test_formats() {
        assert_eq!(Dataset::PeMSD7.series_format(), SeriesFormat::Csv);
        assert_eq!(
            Dataset::PeMSD8.series_format(),
            SeriesFormat::Npy { channel: 2 }
        );
    }
}
