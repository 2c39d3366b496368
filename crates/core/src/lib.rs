//! Shared foundation for the LogFlow anomaly detector: the wire-level data
//! model (log entries, metrics snapshots, anomalies), application
//! configuration, and the common error type.

pub mod config;
pub mod error;
pub mod models;

pub use config::AppConfig;
pub use error::{LogFlowError, LogFlowResult};
pub use models::{Anomaly, AnomalyType, LogEntry, Metrics, Severity, StreamEvent};
