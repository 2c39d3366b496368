//! CUSUM (cumulative sum) detector. Two accumulators per metric track
//! persistent departures above and below a reference mean; small shifts that
//! a single-tick test would miss accumulate until they cross the decision
//! threshold `h`, with slack `k` absorbing benign variation.

use crate::detector::{mean, Detection};
use chrono::Utc;
use logflow_core::models::{Anomaly, AnomalyType, Metrics, Severity};

const DEFAULT_SLACK: f64 = 0.5;
const DEFAULT_THRESHOLD: f64 = 5.0;

#[derive(Default)]
struct CusumState {
    s_pos: f64,
    s_neg: f64,
    mu_ref: f64,
}

pub struct CusumDetector {
    k: f64,
    h: f64,
    initialized: bool,
    error_rate: CusumState,
    requests_per_sec: CusumState,
    avg_response_time: CusumState,
}

impl CusumDetector {
    /// Non-positive `k` falls back to 0.5, non-positive `h` to 5.0.
    pub fn new(k: f64, h: f64) -> Self {
        Self {
            k: if k <= 0.0 { DEFAULT_SLACK } else { k },
            h: if h <= 0.0 { DEFAULT_THRESHOLD } else { h },
            initialized: false,
            error_rate: CusumState::default(),
            requests_per_sec: CusumState::default(),
            avg_response_time: CusumState::default(),
        }
    }
}

impl Detection for CusumDetector {
    fn detect(&mut self, current: &Metrics, history: &[Metrics]) -> Vec<Anomaly> {
        if !self.initialized {
            if history.len() < 10 {
                return Vec::new(); // Not enough data for a reference mean.
            }
            self.error_rate.mu_ref = mean(history, |m| m.error_rate);
            self.requests_per_sec.mu_ref = mean(history, |m| m.requests_per_sec);
            self.avg_response_time.mu_ref = mean(history, |m| m.avg_response_time);
            self.initialized = true;
        }

        let mut anomalies = Vec::new();

        accumulate(
            &mut self.error_rate,
            current.error_rate,
            self.k,
            self.h,
            AnomalyType::ErrorRate,
            "error_rate",
            "Abnormal error rate detected",
            &mut anomalies,
        );
        accumulate(
            &mut self.requests_per_sec,
            current.requests_per_sec,
            self.k,
            self.h,
            AnomalyType::TrafficSpike,
            "requests_per_sec",
            "Traffic spike or drop detected",
            &mut anomalies,
        );
        accumulate(
            &mut self.avg_response_time,
            current.avg_response_time,
            self.k,
            self.h,
            AnomalyType::ResponseTime,
            "avg_response_time",
            "Response time degradation detected",
            &mut anomalies,
        );

        anomalies
    }
}

/// One CUSUM step for one metric. `s_neg` grows while the observation sits
/// persistently below the reference mean. The upward check runs first; either
/// emission resets both accumulators.
#[allow(clippy::too_many_arguments)]
fn accumulate(
    state: &mut CusumState,
    x: f64,
    k: f64,
    h: f64,
    kind: AnomalyType,
    metric: &'static str,
    description: &str,
    anomalies: &mut Vec<Anomaly>,
) {
    state.s_pos = (state.s_pos + (x - state.mu_ref - k)).max(0.0);
    state.s_neg = (state.s_neg - (x - state.mu_ref + k)).max(0.0);

    if state.s_pos > h {
        anomalies.push(Anomaly {
            timestamp: Utc::now(),
            kind,
            severity: severity_for(state.s_pos, h),
            description: format!("{description} (upward shift)"),
            metric: metric.into(),
            actual_value: x,
            expected_value: state.mu_ref,
            deviation: x - state.mu_ref,
        });
        state.s_pos = 0.0;
        state.s_neg = 0.0;
    } else if state.s_neg > h {
        anomalies.push(Anomaly {
            timestamp: Utc::now(),
            kind,
            severity: severity_for(state.s_neg, h),
            description: format!("{description} (downward shift)"),
            metric: metric.into(),
            actual_value: x,
            expected_value: state.mu_ref,
            deviation: state.mu_ref - x,
        });
        state.s_pos = 0.0;
        state.s_neg = 0.0;
    }
}

/// Severity by how far past the decision threshold the accumulator ran.
fn severity_for(cusum: f64, h: f64) -> Severity {
    let ratio = cusum / h;
    if ratio > 3.0 {
        Severity::Critical
    } else if ratio > 2.0 {
        Severity::High
    } else if ratio > 1.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
