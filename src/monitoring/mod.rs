//! Monitoring Module
//!
//! Observability for SST-GNN:
//! - `tracing-subscriber` setup
//! - Per-epoch reports and run history

pub mod logging;
pub mod report;

pub use logging::{init_logging, LogFormat, LogLevel, LoggerConfig};
pub use report::{EpochReport, RunHistory};
