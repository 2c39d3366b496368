//! Metrics aggregation and anomaly detection: a thread-safe rolling metrics
//! collector plus three pluggable detection algorithms (standard deviation,
//! exponentially-weighted moving average, CUSUM).

pub mod collector;
pub mod cusum;
pub mod detector;
pub mod ewma;
pub mod stddev;

pub use collector::MetricsCollector;
pub use cusum::CusumDetector;
pub use detector::{algorithm_for, AnomalyDetector, Detection};
pub use ewma::EwmaDetector;
pub use stddev::StdDevDetector;
