//! Standard-deviation detector: flags any tick whose value strays more than
//! `threshold` population standard deviations from the historical mean. All
//! of its memory lives in the history ring, so it carries no state between
//! ticks.

use crate::detector::{mean_and_std_dev, Detection};
use chrono::Utc;
use logflow_core::models::{Anomaly, AnomalyType, Metrics, Severity};

pub struct StdDevDetector {
    threshold: f64,
}

impl StdDevDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Detection for StdDevDetector {
    fn detect(&mut self, current: &Metrics, history: &[Metrics]) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        if history.len() < 10 {
            return anomalies; // Not enough data for a baseline.
        }

        let (error_rate_mean, error_rate_std_dev) = mean_and_std_dev(history, |m| m.error_rate);
        if (current.error_rate - error_rate_mean).abs() > self.threshold * error_rate_std_dev {
            anomalies.push(Anomaly {
                timestamp: Utc::now(),
                kind: AnomalyType::ErrorRate,
                severity: severity_for(current.error_rate, error_rate_mean, error_rate_std_dev),
                description: "Abnormal error rate detected".into(),
                metric: "error_rate".into(),
                actual_value: current.error_rate,
                expected_value: error_rate_mean,
                deviation: (current.error_rate - error_rate_mean).abs(),
            });
        }

        let (req_rate_mean, req_rate_std_dev) = mean_and_std_dev(history, |m| m.requests_per_sec);
        if (current.requests_per_sec - req_rate_mean).abs() > self.threshold * req_rate_std_dev {
            anomalies.push(Anomaly {
                timestamp: Utc::now(),
                kind: AnomalyType::TrafficSpike,
                severity: severity_for(current.requests_per_sec, req_rate_mean, req_rate_std_dev),
                description: "Traffic spike or drop detected".into(),
                metric: "requests_per_sec".into(),
                actual_value: current.requests_per_sec,
                expected_value: req_rate_mean,
                deviation: (current.requests_per_sec - req_rate_mean).abs(),
            });
        }

        // Response time only degrades upward; faster responses are never
        // anomalous.
        let (resp_time_mean, resp_time_std_dev) =
            mean_and_std_dev(history, |m| m.avg_response_time);
        if current.avg_response_time > resp_time_mean + self.threshold * resp_time_std_dev {
            anomalies.push(Anomaly {
                timestamp: Utc::now(),
                kind: AnomalyType::ResponseTime,
                severity: severity_for(current.avg_response_time, resp_time_mean, resp_time_std_dev),
                description: "Response time degradation detected".into(),
                metric: "avg_response_time".into(),
                actual_value: current.avg_response_time,
                expected_value: resp_time_mean,
                deviation: current.avg_response_time - resp_time_mean,
            });
        }

        anomalies
    }
}

/// Severity by sigma-multiples of the deviation.
fn severity_for(actual: f64, expected: f64, std_dev: f64) -> Severity {
    let deviation = (actual - expected).abs();
    if deviation > 4.0 * std_dev {
        Severity::Critical
    } else if deviation > 3.0 * std_dev {
        Severity::High
    } else if deviation > 2.0 * std_dev {
        Severity::Medium
    } else {
        Severity::Low
    }
}
