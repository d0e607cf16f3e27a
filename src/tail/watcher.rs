//! Log file watcher.
//!
//! Watches one log file for growth and emits newly appended complete
//! lines over a channel. Filesystem notifications are funneled into a
//! single ordered queue consumed by one reader task that owns the
//! [`LogTailer`], so the consumed offset has exactly one writer.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, RecursiveMode},
    DebounceEventResult, DebouncedEvent,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::TailError;
use super::tailer::LogTailer;

/// Debounce window for filesystem notifications.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// A running watch on one log file.
///
/// Created by [`LogWatcher::start`]; newly appended complete lines
/// arrive on the returned receiver. Dropping the watcher stops it.
#[derive(Debug)]
pub struct LogWatcher {
    /// File being tailed.
    path: PathBuf,
    /// Set once by `stop`; in-flight notifications observed after this
    /// are discarded.
    stopped: Arc<AtomicBool>,
    /// Ends the reader task, which drops the underlying notify watcher.
    cancel: CancellationToken,
}

impl LogWatcher {
    /// Start watching `path` for growth.
    ///
    /// The tailer starts at the file's current length so output from a
    /// previous run is never replayed. The file itself may not exist
    /// yet, but its directory must: notifications are delivered for the
    /// parent directory and filtered to this file, which keeps working
    /// when the writer recreates the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's length cannot be read or the
    /// parent directory cannot be watched.
    pub fn start(path: &Path) -> Result<(Self, mpsc::UnboundedReceiver<String>), TailError> {
        let tailer = LogTailer::at_end(path.to_path_buf())?;
        let watch_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let (change_tx, mut change_rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(
            DEBOUNCE_WINDOW,
            None,
            move |result: DebounceEventResult| {
                // Runs on the notify worker thread; unbounded send never blocks.
                let _ = change_tx.send(result);
            },
        )?;
        debouncer.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        tracing::debug!(path = %path.display(), offset = tailer.offset(), "Watching log file");

        tokio::spawn({
            let stopped = Arc::clone(&stopped);
            let cancel = cancel.clone();
            let path = path.to_path_buf();
            let mut tailer = tailer;
            async move {
                loop {
                    tokio::select! {
                        biased;

                        () = cancel.cancelled() => break,

                        change = change_rx.recv() => {
                            let Some(result) = change else { break };
                            if stopped.load(Ordering::SeqCst) {
                                break;
                            }
                            if !handle_change(result, &path, &mut tailer, &line_tx).await {
                                break;
                            }
                        }
                    }
                }
                // Dropping the debouncer here ceases watching.
                drop(debouncer);
            }
        });

        Ok((
            Self {
                path: path.to_path_buf(),
                stopped,
                cancel,
            },
            line_rx,
        ))
    }

    /// Stop watching.
    ///
    /// Idempotent, and safe to call from a different task or thread than
    /// the one delivering notifications; notifications racing with this
    /// call are discarded.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(path = %self.path.display(), "Stopping log watcher");
        self.cancel.cancel();
    }

    /// Whether `stop` has been invoked.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// The file being watched.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Process one debounced notification batch. Returns `false` when the
/// line receiver is gone and the reader should exit.
async fn handle_change(
    result: DebounceEventResult,
    path: &Path,
    tailer: &mut LogTailer,
    lines: &mpsc::UnboundedSender<String>,
) -> bool {
    match result {
        Ok(events) => {
            if !events.iter().any(|event| touches_file(event, path)) {
                return true;
            }
            match tailer.read_new_lines().await {
                Ok(new_lines) => {
                    for line in new_lines {
                        if lines.send(line).is_err() {
                            return false;
                        }
                    }
                }
                Err(e) => {
                    // Transient (the writer may briefly hold the file);
                    // retried on the next notification.
                    tracing::debug!(
                        path = %path.display(),
                        error = %e,
                        "Tail read failed, retrying on next notification"
                    );
                }
            }
        }
        Err(errors) => {
            for error in errors {
                tracing::warn!(path = %path.display(), error = %error, "Watch error");
            }
        }
    }
    true
}

/// Whether a notification concerns the tailed file. The watch is
/// non-recursive on the parent directory, so matching on the file name
/// is unambiguous and insensitive to path canonicalization.
fn touches_file(event: &DebouncedEvent, path: &Path) -> bool {
    use notify::EventKind;

    if matches!(event.kind, EventKind::Remove(_)) {
        return false;
    }
    event.paths.iter().any(|p| p.file_name() == path.file_name())
}
