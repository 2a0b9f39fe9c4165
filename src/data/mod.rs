//! Data Module
//!
//! Turning raw PeMS files into model inputs:
//! - CSV and NPY series readers, distance matrix reader
//! - Cyclical positional encoding
//! - Same-time-of-day sliding windows

pub mod loader;
pub mod positional;
pub mod window;

pub use loader::{
    read_distance_csv, read_series_csv, read_series_npy, DataLoader, LoadedData, HOURLY_SAMPLES,
};
pub use positional::{PositionalEncoder, SAMPLES_PER_DAY, SAMPLES_PER_WEEK};
pub use window::{SensorSeries, Window, WindowConfig, WindowedDataset};
