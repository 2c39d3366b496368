//! Exponentially-weighted moving-average detector. Each tracked metric keeps
//! its own EWMA baseline that adapts to slow drift; a tick is flagged when it
//! jumps past `threshold` times the baseline in one step.

use crate::detector::{mean, Detection};
use chrono::Utc;
use logflow_core::models::{Anomaly, AnomalyType, Metrics, Severity};

const DEFAULT_ALPHA: f64 = 0.3;

pub struct EwmaDetector {
    threshold: f64,
    alpha: f64,
    initialized: bool,
    ewma_error_rate: f64,
    ewma_requests_per_sec: f64,
    ewma_avg_response_time: f64,
}

impl EwmaDetector {
    /// `alpha` must lie in (0, 1); out-of-range values fall back to 0.3.
    pub fn new(threshold: f64, alpha: f64) -> Self {
        let alpha = if alpha <= 0.0 || alpha >= 1.0 {
            DEFAULT_ALPHA
        } else {
            alpha
        };

        Self {
            threshold,
            alpha,
            initialized: false,
            ewma_error_rate: 0.0,
            ewma_requests_per_sec: 0.0,
            ewma_avg_response_time: 0.0,
        }
    }
}

impl Detection for EwmaDetector {
    fn detect(&mut self, current: &Metrics, history: &[Metrics]) -> Vec<Anomaly> {
        if !self.initialized {
            if history.len() < 5 {
                return Vec::new(); // Not enough data to seed the baselines.
            }
            self.ewma_error_rate = mean(history, |m| m.error_rate);
            self.ewma_requests_per_sec = mean(history, |m| m.requests_per_sec);
            self.ewma_avg_response_time = mean(history, |m| m.avg_response_time);
            self.initialized = true;
        }

        let mut anomalies = Vec::new();

        // Error rate: the baseline guard keeps a near-zero error rate from
        // flagging every tiny fluctuation.
        let prev = self.ewma_error_rate;
        self.ewma_error_rate = self.alpha * current.error_rate + (1.0 - self.alpha) * prev;
        let deviation = (current.error_rate - prev).abs();
        if prev > 0.01 && deviation > self.threshold * prev {
            anomalies.push(Anomaly {
                timestamp: Utc::now(),
                kind: AnomalyType::ErrorRate,
                severity: severity_for(deviation, prev),
                description: "Abnormal error rate detected".into(),
                metric: "error_rate".into(),
                actual_value: current.error_rate,
                expected_value: prev,
                deviation,
            });
        }

        // Request rate: both directions count.
        let prev = self.ewma_requests_per_sec;
        self.ewma_requests_per_sec = self.alpha * current.requests_per_sec + (1.0 - self.alpha) * prev;
        let deviation = (current.requests_per_sec - prev).abs();
        if prev > 0.0 && deviation > self.threshold * prev {
            anomalies.push(Anomaly {
                timestamp: Utc::now(),
                kind: AnomalyType::TrafficSpike,
                severity: severity_for(deviation, prev),
                description: "Traffic spike or drop detected".into(),
                metric: "requests_per_sec".into(),
                actual_value: current.requests_per_sec,
                expected_value: prev,
                deviation,
            });
        }

        // Response time: only slowdowns are flagged, so the deviation stays
        // signed.
        let prev = self.ewma_avg_response_time;
        self.ewma_avg_response_time =
            self.alpha * current.avg_response_time + (1.0 - self.alpha) * prev;
        let deviation = current.avg_response_time - prev;
        if prev > 0.0 && deviation > self.threshold * prev {
            anomalies.push(Anomaly {
                timestamp: Utc::now(),
                kind: AnomalyType::ResponseTime,
                severity: severity_for(deviation, prev),
                description: "Response time degradation detected".into(),
                metric: "avg_response_time".into(),
                actual_value: current.avg_response_time,
                expected_value: prev,
                deviation,
            });
        }

        anomalies
    }
}

/// Severity by deviation-to-baseline ratio.
fn severity_for(deviation: f64, expected: f64) -> Severity {
    if expected == 0.0 {
        return Severity::Low;
    }
    let ratio = deviation / expected;
    if ratio > 2.0 {
        Severity::Critical
    } else if ratio > 1.0 {
        Severity::High
    } else if ratio > 0.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
