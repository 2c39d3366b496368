//! Log streaming: the file tailer plus the tail-and-parse pipeline stage
//! that turns appended file bytes into parsed [`LogEntry`] values.

pub mod tailer;

pub use tailer::Tailer;

use logflow_core::models::LogEntry;
use logflow_core::LogFlowResult;
use logflow_parser::LogParser;
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Tail-and-parse stage: consumes tailer lines, parses each according to the
/// configured format, and forwards entries downstream. Lines that fail to
/// parse are dropped.
pub struct LogStream {
    path: PathBuf,
    parser: Box<dyn LogParser>,
}

impl LogStream {
    pub fn new(path: impl Into<PathBuf>, format: &str) -> Self {
        Self {
            path: path.into(),
            parser: logflow_parser::for_format(format),
        }
    }

    /// Run until shutdown or until the downstream channel closes. Failing to
    /// start the tailer is fatal and surfaces to the caller. Entry sends
    /// block when the channel is full, propagating backpressure up to the
    /// tailer (whose own channel drops instead).
    pub async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
        output: mpsc::Sender<LogEntry>,
    ) -> LogFlowResult<()> {
        let (tailer, mut lines) = Tailer::start(&self.path).await?;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tailer.stop();
                    break;
                }

                line = lines.recv() => match line {
                    Some(line) => match self.parser.parse(&line) {
                        Ok(entry) => {
                            if output.send(entry).await.is_err() {
                                tailer.stop();
                                break;
                            }
                        }
                        Err(e) => debug!(error = %e, "Failed to parse log line"),
                    },
                    None => break,
                }
            }
        }

        info!("Log stream stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_tails_parses_and_skips_bad_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (entry_tx, mut entry_rx) = mpsc::channel(100);

        let stream = LogStream::new(&path, "json");
        let handle = tokio::spawn(stream.run(shutdown_rx, entry_tx));

        // Give the tailer a moment to register before appending.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        writeln!(file, "this is not json").unwrap();
        writeln!(file, r#"{{"level":"error","message":"db down","status_code":500}}"#).unwrap();

        let entry = tokio::time::timeout(Duration::from_secs(2), entry_rx.recv())
            .await
            .expect("entry within 2s")
            .expect("channel open");
        // The unparseable line was dropped; only the JSON line came through.
        assert_eq!(entry.level, "error");
        assert_eq!(entry.status_code, 500);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("stream task exits promptly")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_a_startup_error() {
        let dir = TempDir::new().unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (entry_tx, _entry_rx) = mpsc::channel(100);

        let stream = LogStream::new(dir.path().join("absent.log"), "json");
        assert!(stream.run(shutdown_rx, entry_tx).await.is_err());
    }
}
