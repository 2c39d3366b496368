//! Thread-safe rolling metrics aggregation. A mutable current window absorbs
//! log entries; once per tick it is snapshotted into an immutable [`Metrics`]
//! record, archived in a bounded history ring, and replaced.

use chrono::Utc;
use logflow_core::models::{IpCount, LogEntry, Metrics, PathCount, UserAgentCount};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Maximum number of archived snapshots fed to the detectors.
const MAX_HISTORY: usize = 100;

/// Maximum entries in each top-N breakdown.
const TOP_LIMIT: usize = 10;

/// Mutable aggregate for the interval since its creation.
struct MetricsWindow {
    started: Instant,
    total_requests: u64,
    error_count: u64,
    response_times: Vec<f64>,
    status_codes: HashMap<u16, u64>,
    paths: HashMap<String, u64>,
    ips: HashMap<String, u64>,
    user_agents: HashMap<String, u64>,
}

impl MetricsWindow {
    fn new(response_time_hint: usize) -> Self {
        Self {
            started: Instant::now(),
            total_requests: 0,
            error_count: 0,
            response_times: Vec::with_capacity(response_time_hint),
            status_codes: HashMap::with_capacity(10),
            paths: HashMap::with_capacity(50),
            ips: HashMap::with_capacity(100),
            user_agents: HashMap::with_capacity(20),
        }
    }
}

struct CollectorState {
    window: MetricsWindow,
    history: VecDeque<Metrics>,
}

/// Collects log entries into the current window and archives per-tick
/// snapshots. All three operations are safe to call from any thread; a single
/// reader-writer lock protects both the window and the history ring.
pub struct MetricsCollector {
    state: RwLock<CollectorState>,
    response_time_hint: usize,
}

impl MetricsCollector {
    /// `response_time_hint` pre-sizes the per-window response-time buffer;
    /// it has no behavioral effect.
    pub fn new(response_time_hint: usize) -> Self {
        Self {
            state: RwLock::new(CollectorState {
                window: MetricsWindow::new(response_time_hint),
                history: VecDeque::with_capacity(MAX_HISTORY),
            }),
            response_time_hint,
        }
    }

    /// Fold one entry into the current window.
    ///
    /// An entry counts toward the error rate iff its level is `error` or its
    /// status code is >= 400. Note that this includes 4xx client errors.
    pub fn add_entry(&self, entry: &LogEntry) {
        let mut state = self.state.write();
        let window = &mut state.window;

        window.total_requests += 1;

        if entry.level == "error" || entry.status_code >= 400 {
            window.error_count += 1;
        }

        if entry.status_code > 0 {
            *window.status_codes.entry(entry.status_code).or_insert(0) += 1;
        }

        if !entry.path.is_empty() {
            *window.paths.entry(entry.path.clone()).or_insert(0) += 1;
        }

        if !entry.ip_address.is_empty() {
            *window.ips.entry(entry.ip_address.clone()).or_insert(0) += 1;
        }

        if !entry.user_agent.is_empty() {
            *window.user_agents.entry(entry.user_agent.clone()).or_insert(0) += 1;
        }

        if entry.response_time > 0.0 {
            window.response_times.push(entry.response_time);
        }
    }

    /// Compute the metrics for the current window, archive them in history
    /// (evicting the oldest snapshot past capacity), and start a fresh
    /// window. This is the only way the window rolls.
    pub fn snapshot(&self) -> Metrics {
        let mut state = self.state.write();

        let metrics = compute_metrics(&state.window);

        state.history.push_back(metrics.clone());
        if state.history.len() > MAX_HISTORY {
            state.history.pop_front();
        }

        state.window = MetricsWindow::new(self.response_time_hint);

        metrics
    }

    /// Independent copy of the archived snapshots, oldest first.
    pub fn history(&self) -> Vec<Metrics> {
        let state = self.state.read();
        state.history.iter().cloned().collect()
    }
}

fn compute_metrics(window: &MetricsWindow) -> Metrics {
    let elapsed = window.started.elapsed().as_secs_f64().max(1.0);
    let requests_per_sec = window.total_requests as f64 / elapsed;

    let error_rate = if window.total_requests > 0 {
        window.error_count as f64 / window.total_requests as f64
    } else {
        0.0
    };

    let avg_response_time = if window.response_times.is_empty() {
        0.0
    } else {
        window.response_times.iter().sum::<f64>() / window.response_times.len() as f64
    };

    Metrics {
        timestamp: Utc::now(),
        requests_per_sec,
        error_rate,
        avg_response_time,
        status_codes: window.status_codes.clone(),
        top_paths: top_n(&window.paths, TOP_LIMIT, |key, count| PathCount {
            path: key.to_string(),
            count,
        }),
        top_ips: top_n(&window.ips, TOP_LIMIT, |key, count| IpCount {
            ip: key.to_string(),
            count,
        }),
        top_user_agents: top_n(&window.user_agents, TOP_LIMIT, |key, count| UserAgentCount {
            user_agent: key.to_string(),
            count,
        }),
    }
}

/// Top `limit` map entries by count descending; ties break arbitrarily.
fn top_n<T>(counts: &HashMap<String, u64>, limit: usize, make: impl Fn(&str, u64) -> T) -> Vec<T> {
    let mut sorted: Vec<(&str, u64)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    sorted.sort_unstable_by(|a, b| b.1.cmp(&a.1));
    sorted
        .into_iter()
        .take(limit)
        .map(|(key, count)| make(key, count))
        .collect()
}
