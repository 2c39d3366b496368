//! Detection algorithm seam and the collect-and-detect pipeline stage.

use crate::collector::MetricsCollector;
use crate::cusum::CusumDetector;
use crate::ewma::EwmaDetector;
use crate::stddev::StdDevDetector;
use logflow_core::config::DetectorConfig;
use logflow_core::models::{Anomaly, LogEntry, Metrics, StreamEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// A detection strategy. Called once per tick with the freshly rolled
/// snapshot and the archived history; implementations may keep internal
/// state between calls, so a detector instance is not interchangeable
/// mid-run.
pub trait Detection: Send {
    fn detect(&mut self, current: &Metrics, history: &[Metrics]) -> Vec<Anomaly>;
}

/// Select the detection algorithm named by the configuration. Unknown names
/// fall back to the standard-deviation detector.
pub fn algorithm_for(cfg: &DetectorConfig) -> Box<dyn Detection> {
    match cfg.algorithm.as_str() {
        "moving_average" => Box::new(EwmaDetector::new(
            cfg.sensitivity_level,
            cfg.smoothing_factor,
        )),
        "cusum" => Box::new(CusumDetector::new(cfg.cusum_slack, cfg.cusum_threshold)),
        _ => Box::new(StdDevDetector::new(cfg.sensitivity_level)),
    }
}

/// Owns the metrics collector and one detection algorithm, and drives the
/// once-per-second evaluation loop.
pub struct AnomalyDetector {
    collector: Arc<MetricsCollector>,
    algorithm: Box<dyn Detection>,
}

impl AnomalyDetector {
    pub fn new(cfg: &DetectorConfig) -> Self {
        info!(
            algorithm = %cfg.algorithm,
            sensitivity = cfg.sensitivity_level,
            "Anomaly detector configured"
        );
        Self {
            collector: Arc::new(MetricsCollector::new(cfg.window_size)),
            algorithm: algorithm_for(cfg),
        }
    }

    /// Shared handle to the underlying collector.
    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Consume parsed entries and evaluate once per second, pushing each
    /// snapshot and any anomalies downstream. Sends block when the output
    /// channel is full, which backs pressure up through the pipeline.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
        mut entries: mpsc::Receiver<LogEntry>,
        output: mpsc::Sender<StreamEvent>,
    ) {
        // First evaluation lands one full second in; a tick at startup would
        // snapshot an empty window.
        let period = Duration::from_secs(1);
        let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                entry = entries.recv() => match entry {
                    Some(entry) => self.collector.add_entry(&entry),
                    None => break,
                },

                _ = tick.tick() => {
                    let metrics = self.collector.snapshot();
                    let history = self.collector.history();
                    let anomalies = self.algorithm.detect(&metrics, &history);

                    if !anomalies.is_empty() {
                        debug!(count = anomalies.len(), "Anomalies detected this tick");
                    }

                    if output.send(StreamEvent::Metrics(metrics)).await.is_err() {
                        break;
                    }
                    let mut downstream_closed = false;
                    for anomaly in anomalies {
                        if output.send(StreamEvent::Anomaly(anomaly)).await.is_err() {
                            downstream_closed = true;
                            break;
                        }
                    }
                    if downstream_closed {
                        break;
                    }
                }
            }
        }

        info!("Anomaly detector stopped");
    }
}

/// Arithmetic mean of one metric field over the history.
pub(crate) fn mean(history: &[Metrics], value: impl Fn(&Metrics) -> f64) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    history.iter().map(value).sum::<f64>() / history.len() as f64
}

/// Population mean and standard deviation of one metric field over the
/// history (variance divided by N, not N-1).
pub(crate) fn mean_and_std_dev(
    history: &[Metrics],
    value: impl Fn(&Metrics) -> f64,
) -> (f64, f64) {
    if history.is_empty() {
        return (0.0, 0.0);
    }

    let mean = history.iter().map(&value).sum::<f64>() / history.len() as f64;
    let variance = history
        .iter()
        .map(|m| {
            let diff = value(m) - mean;
            diff * diff
        })
        .sum::<f64>()
        / history.len() as f64;

    (mean, variance.sqrt())
}


#[cfg(test)]
mod tests {
    use super::test_support::{flat_history, metrics};
    use super::*;

    #[test]
    fn test_algorithm_selection() {
        let mut cfg = DetectorConfig::default();

        cfg.algorithm = "moving_average".into();
        // EWMA initializes from 5 history entries; StdDev/CUSUM need 10.
        let mut algo = algorithm_for(&cfg);
        assert!(!algo
            .detect(&metrics(500.0, 0.5, 500.0), &flat_history(5, 100.0, 0.05, 50.0))
            .is_empty());

        cfg.algorithm = "made_up_algorithm".into();
        let mut fallback = algorithm_for(&cfg);
        // StdDev stays silent below 10 history entries.
        assert!(fallback
            .detect(&metrics(500.0, 0.5, 500.0), &flat_history(9, 100.0, 0.05, 50.0))
            .is_empty());
    }

    #[test]
    fn test_mean_and_std_dev_population() {
        let history = vec![
            metrics(2.0, 0.0, 0.0),
            metrics(4.0, 0.0, 0.0),
            metrics(4.0, 0.0, 0.0),
            metrics(4.0, 0.0, 0.0),
            metrics(5.0, 0.0, 0.0),
            metrics(5.0, 0.0, 0.0),
            metrics(7.0, 0.0, 0.0),
            metrics(9.0, 0.0, 0.0),
        ];
        let (mean, std_dev) = mean_and_std_dev(&history, |m| m.requests_per_sec);
        assert_eq!(mean, 5.0);
        // Population standard deviation of the classic example set is 2.
        assert_eq!(std_dev, 2.0);
    }

    #[test]
    fn test_stats_on_empty_history_are_zero() {
        let (mean_v, std_dev) = mean_and_std_dev(&[], |m| m.error_rate);
        assert_eq!(mean_v, 0.0);
        assert_eq!(std_dev, 0.0);
        assert_eq!(mean(&[], |m| m.error_rate), 0.0);
    }

    #[tokio::test]
    async fn test_run_emits_metrics_then_anomalies_and_shuts_down() {
        let cfg = DetectorConfig {
            algorithm: "stddev".into(),
            ..DetectorConfig::default()
        };
        let detector = AnomalyDetector::new(&cfg);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (entry_tx, entry_rx) = mpsc::channel(100);
        let (event_tx, mut event_rx) = mpsc::channel(100);

        let handle = tokio::spawn(detector.run(shutdown_rx, entry_rx, event_tx));

        entry_tx
            .send(LogEntry {
                level: "info".into(),
                message: "hello".into(),
                ..LogEntry::default()
            })
            .await
            .unwrap();

        // The first tick produces a metrics snapshot.
        let event = tokio::time::timeout(Duration::from_secs(3), event_rx.recv())
            .await
            .expect("tick within 3s")
            .expect("channel open");
        assert!(matches!(event, StreamEvent::Metrics(_)));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("detector task exits promptly after shutdown")
            .unwrap();
    }
}
