//! LogFlow: real-time log anomaly detection.
//!
//! Main entry point: tails the configured log file, aggregates per-second
//! metrics, runs the configured detection algorithm, and serves live results
//! on the web dashboard.

use clap::Parser;
use logflow_analyzer::AnomalyDetector;
use logflow_core::config::AppConfig;
use logflow_core::models::{LogEntry, StreamEvent};
use logflow_dashboard::DashboardServer;
use logflow_stream::LogStream;
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

/// Capacity of the interior pipeline channels; when full, senders block,
/// which is the backpressure path back toward the tailer.
const CHANNEL_CAPACITY: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "logflow")]
#[command(about = "Real-time log anomaly detection with a live web dashboard")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, env = "LOGFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Log file to tail (overrides config)
    #[arg(long, env = "LOGFLOW__LOG_PATH")]
    log_path: Option<String>,

    /// Log format: json, apache, combined, or common (overrides config)
    #[arg(long, env = "LOGFLOW__LOG_FORMAT")]
    log_format: Option<String>,

    /// Detection algorithm: stddev, moving_average, or cusum (overrides config)
    #[arg(long)]
    algorithm: Option<String>,

    /// Dashboard port (overrides config)
    #[arg(long, env = "LOGFLOW__DASHBOARD__PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logflow=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("LogFlow starting up");

    // Load configuration
    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(log_path) = cli.log_path {
        config.log_path = log_path;
    }
    if let Some(log_format) = cli.log_format {
        config.log_format = log_format;
    }
    if let Some(algorithm) = cli.algorithm {
        config.detector.algorithm = algorithm;
    }
    if let Some(port) = cli.port {
        config.dashboard.port = port;
    }

    info!(
        log_path = %config.log_path,
        log_format = %config.log_format,
        algorithm = %config.detector.algorithm,
        dashboard_port = config.dashboard.port,
        "Configuration loaded"
    );

    if config.detector.window_size != 100 {
        info!(
            window_size = config.detector.window_size,
            "window_size is advisory: it sizes buffers but does not change windowing"
        );
    }

    // Pipeline channels and the shared shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (entry_tx, entry_rx) = mpsc::channel::<LogEntry>(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<StreamEvent>(CHANNEL_CAPACITY);

    let stream = LogStream::new(&config.log_path, &config.log_format);
    let detector = AnomalyDetector::new(&config.detector);
    let dashboard = DashboardServer::new(config.dashboard.clone());

    // Tail + parse
    let stream_shutdown = shutdown_tx.clone();
    let stream_task = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move {
            if let Err(e) = stream.run(shutdown, entry_tx).await {
                error!(error = %e, "Log stream failed");
                let _ = stream_shutdown.send(true);
            }
        }
    });

    // Collect + detect
    let detector_task = tokio::spawn(detector.run(shutdown_rx.clone(), entry_rx, event_tx));

    // Dashboard
    let dashboard_shutdown = shutdown_tx.clone();
    let dashboard_task = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move {
            if let Err(e) = dashboard.run(shutdown, event_rx).await {
                error!(error = %e, "Dashboard server failed");
                let _ = dashboard_shutdown.send(true);
            }
        }
    });

    // Ctrl-C propagates through the single shutdown signal
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    info!("LogFlow is running");

    let (stream_res, detector_res, dashboard_res) =
        tokio::join!(stream_task, detector_task, dashboard_task);
    stream_res?;
    detector_res?;
    dashboard_res?;

    info!("LogFlow stopped");
    Ok(())
}
