//! Tail error types.

/// Errors that can occur while watching or tailing a log file.
#[derive(thiserror::Error, Debug)]
pub enum TailError {
    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// I/O error reading the log file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
