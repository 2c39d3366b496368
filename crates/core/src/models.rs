//! Core data model: parsed log entries, per-window metrics snapshots, and
//! detected anomalies. These types define the JSON contract used by the JSON
//! log parser and the dashboard feed, so field names here are load-bearing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One parsed log record. Immutable once constructed; ownership moves down
/// the pipeline and the entry is discarded after the collector absorbs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub response_time: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for LogEntry {
    fn default() -> Self {
        Self {
            timestamp: DateTime::<Utc>::default(),
            level: String::new(),
            message: String::new(),
            source: String::new(),
            user_agent: String::new(),
            ip_address: String::new(),
            status_code: 0,
            response_time: 0.0,
            method: String::new(),
            path: String::new(),
            extra: HashMap::new(),
        }
    }
}

fn is_zero_u16(v: &u16) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

/// Aggregated metrics for one completed window, emitted once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub timestamp: DateTime<Utc>,
    pub requests_per_sec: f64,
    pub error_rate: f64,
    pub avg_response_time: f64,
    pub status_codes: HashMap<u16, u64>,
    pub top_paths: Vec<PathCount>,
    pub top_ips: Vec<IpCount>,
    pub top_user_agents: Vec<UserAgentCount>,
}

/// Request count for one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathCount {
    pub path: String,
    pub count: u64,
}

/// Request count for one client IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpCount {
    pub ip: String,
    pub count: u64,
}

/// Request count for one user agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAgentCount {
    pub user_agent: String,
    pub count: u64,
}

/// Category of a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    ErrorRate,
    TrafficSpike,
    ResponseTime,
    Pattern,
    StatusCode,
}

/// How far outside normal the offending value was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single threshold crossing for a single metric at a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: AnomalyType,
    pub severity: Severity,
    pub description: String,
    pub metric: String,
    pub actual_value: f64,
    pub expected_value: f64,
    pub deviation: f64,
}

/// One value on the dashboard feed. Serialized untagged so clients receive
/// plain Metrics or Anomaly objects, distinguished by their fields.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Metrics(Metrics),
    Anomaly(Anomaly),
}
