//! Real-time file tailer. Emits complete lines appended after start, riding
//! filesystem notifications with a 100 ms polling fallback, and survives
//! rotation by rename, removal, and truncation.

use logflow_core::{LogFlowError, LogFlowResult};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Emitted lines buffer up to this many entries; beyond that lines are
/// dropped, because the filesystem offers no backpressure.
const LINE_CHANNEL_CAPACITY: usize = 100;

const FS_EVENT_CAPACITY: usize = 64;

/// Fallback poll cadence; watchers drop events under load.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period after a rename/remove before reopening the path.
const ROTATION_GRACE: Duration = Duration::from_millis(100);

/// Tails a single file path. Pre-existing content is never replayed: the
/// tailer seeks to the end at start and emits only lines appended afterwards.
pub struct Tailer {
    stop_tx: watch::Sender<bool>,
}

impl Tailer {
    /// Open the file, seek to its end, register a filesystem watch, and spawn
    /// the tail loop. Failure to open or watch is fatal; everything after
    /// start is retried.
    pub async fn start(path: impl Into<PathBuf>) -> LogFlowResult<(Self, mpsc::Receiver<String>)> {
        let path = path.into();

        let mut file = File::open(&path).await?;
        let offset = file.seek(SeekFrom::End(0)).await?;

        let (fs_tx, fs_rx) = mpsc::channel(FS_EVENT_CAPACITY);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // A full buffer just means the poll tick catches up.
            let _ = fs_tx.try_send(res);
        })
        .map_err(|e| LogFlowError::Watch(e.to_string()))?;
        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|e| LogFlowError::Watch(e.to_string()))?;

        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);

        info!(path = %path.display(), "Started tailing file");

        let state = TailState {
            path,
            reader: Some(BufReader::new(file)),
            offset,
            partial: String::new(),
            lines: line_tx,
            watcher,
        };
        tokio::spawn(state.run(stop_rx, fs_rx));

        Ok((Self { stop_tx }, line_rx))
    }

    /// Stop tailing and close the line channel. Safe to call more than once;
    /// dropping the tailer has the same effect.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

struct TailState {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    offset: u64,
    partial: String,
    lines: mpsc::Sender<String>,
    watcher: RecommendedWatcher,
}

impl TailState {
    async fn run(
        mut self,
        mut stop: watch::Receiver<bool>,
        mut events: mpsc::Receiver<notify::Result<Event>>,
    ) {
        let mut poll = tokio::time::interval(POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.changed() => {
                    debug!("Stop signal received");
                    break;
                }

                event = events.recv() => match event {
                    Some(Ok(event)) => self.handle_event(event).await,
                    Some(Err(e)) => warn!(error = %e, "File watcher error"),
                    None => break,
                },

                _ = poll.tick() => {
                    self.read_new_lines().await;
                }
            }
        }

        info!("Tailer stopped");
    }

    async fn handle_event(&mut self, event: Event) {
        match event.kind {
            EventKind::Modify(ModifyKind::Name(_)) => {
                debug!(path = %self.path.display(), "File renamed");
                self.handle_rotation().await;
            }
            EventKind::Remove(_) => {
                debug!(path = %self.path.display(), "File removed");
                self.handle_rotation().await;
            }
            EventKind::Create(_) if event.paths.iter().any(|p| p.ends_with(&self.path) || p == &self.path) => {
                debug!(path = %self.path.display(), "File created");
                self.reopen().await;
            }
            EventKind::Modify(_) | EventKind::Any => {
                self.read_new_lines().await;
            }
            _ => {}
        }
    }

    async fn read_new_lines(&mut self) {
        if self.reader.is_none() {
            // The handle was lost during rotation; keep trying to reattach.
            self.reopen().await;
        }
        let Some(reader) = self.reader.as_mut() else {
            return;
        };

        let size = match reader.get_ref().metadata().await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(error = %e, "Failed to stat file");
                return;
            }
        };

        // A shrinking file means truncation: the old content past our offset
        // is gone, so start over from the top of the new content.
        if size < self.offset {
            info!(path = %self.path.display(), "File truncated, resetting to beginning");
            if let Err(e) = reader.seek(SeekFrom::Start(0)).await {
                warn!(error = %e, "Failed to seek after truncation");
                return;
            }
            self.offset = 0;
            self.partial.clear();
            return;
        }

        if size == self.offset {
            return;
        }

        loop {
            let mut chunk = String::new();
            match reader.read_line(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    self.offset += n as u64;

                    if !chunk.ends_with('\n') {
                        // Incomplete line at EOF; finish it on the next read.
                        self.partial.push_str(&chunk);
                        break;
                    }

                    let mut line = std::mem::take(&mut self.partial);
                    line.push_str(&chunk);

                    let stripped = line.strip_suffix('\n').unwrap_or(line.as_str());
                    let stripped = stripped.strip_suffix('\r').unwrap_or(stripped);
                    if stripped.is_empty() {
                        continue;
                    }

                    match self.lines.try_send(stripped.to_string()) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!("Line channel full, dropping line");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => return,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Error reading file");
                    break;
                }
            }
        }
    }

    async fn handle_rotation(&mut self) {
        // Give the rotating writer a moment to create the replacement file.
        tokio::time::sleep(ROTATION_GRACE).await;
        self.reopen().await;
    }

    async fn reopen(&mut self) {
        self.reader = None;
        match File::open(&self.path).await {
            Ok(file) => {
                self.reader = Some(BufReader::new(file));
                self.offset = 0;
                self.partial.clear();

                // inotify watches follow the inode, so re-register the path.
                let _ = self.watcher.unwatch(&self.path);
                if let Err(e) = self.watcher.watch(&self.path, RecursiveMode::NonRecursive) {
                    debug!(error = %e, "Failed to re-register watch; polling keeps the tail alive");
                }

                info!(path = %self.path.display(), "Reopened file");
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to reopen file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &std::path::Path, content: &str) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    async fn recv_line(rx: &mut mpsc::Receiver<String>) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
    }

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "preexisting line\n").unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_does_not_replay_existing_content() {
        let (_dir, path) = setup();
        let (_tailer, mut rx) = Tailer::start(&path).await.unwrap();

        append(&path, "fresh\n");
        assert_eq!(recv_line(&mut rx).await.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = Tailer::start(dir.path().join("absent.log")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_strips_crlf_and_skips_empty_lines() {
        let (_dir, path) = setup();
        let (_tailer, mut rx) = Tailer::start(&path).await.unwrap();

        append(&path, "windows line\r\n\n\nplain line\n");
        assert_eq!(recv_line(&mut rx).await.as_deref(), Some("windows line"));
        assert_eq!(recv_line(&mut rx).await.as_deref(), Some("plain line"));
    }

    #[tokio::test]
    async fn test_buffers_partial_lines_until_complete() {
        let (_dir, path) = setup();
        let (_tailer, mut rx) = Tailer::start(&path).await.unwrap();

        append(&path, "par");
        // Let at least one poll consume the incomplete fragment.
        tokio::time::sleep(Duration::from_millis(300)).await;
        append(&path, "tial\n");

        assert_eq!(recv_line(&mut rx).await.as_deref(), Some("partial"));
    }

    #[tokio::test]
    async fn test_rotation_by_rename() {
        let (dir, path) = setup();
        let (_tailer, mut rx) = Tailer::start(&path).await.unwrap();

        append(&path, "A\nB\n");
        assert_eq!(recv_line(&mut rx).await.as_deref(), Some("A"));
        assert_eq!(recv_line(&mut rx).await.as_deref(), Some("B"));

        std::fs::rename(&path, dir.path().join("app.log.1")).unwrap();
        std::fs::write(&path, "C\n").unwrap();

        // The replacement file is picked up without replaying A or B.
        assert_eq!(recv_line(&mut rx).await.as_deref(), Some("C"));
    }

    #[tokio::test]
    async fn test_truncation_resets_to_beginning() {
        let (_dir, path) = setup();
        let (_tailer, mut rx) = Tailer::start(&path).await.unwrap();

        append(&path, "one\ntwo\n");
        assert_eq!(recv_line(&mut rx).await.as_deref(), Some("one"));
        assert_eq!(recv_line(&mut rx).await.as_deref(), Some("two"));

        // Truncate and start a shorter file.
        std::fs::write(&path, "three\n").unwrap();
        assert_eq!(recv_line(&mut rx).await.as_deref(), Some("three"));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_closes_channel() {
        let (_dir, path) = setup();
        let (tailer, mut rx) = Tailer::start(&path).await.unwrap();

        tailer.stop();
        tailer.stop();

        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("channel closes before timeout");
        assert!(closed.is_none());
    }
}
