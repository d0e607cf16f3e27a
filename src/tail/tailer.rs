//! Incremental log file tailer.
//!
//! Reads newly appended complete lines from a growing log file.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

use super::error::TailError;

/// Incremental line reader that tracks how far into the file it has
/// consumed.
///
/// Only complete, newline-terminated lines are consumed; a partial
/// trailing write stays in the file until its terminator arrives. The
/// offset never moves backwards except when truncation resets it, and is
/// only ever advanced by the single reader driving this tailer.
#[derive(Debug)]
pub struct LogTailer {
    /// Path to the log file.
    path: PathBuf,
    /// Byte offset of consumed content.
    offset: u64,
}

impl LogTailer {
    /// Create a tailer reading from the start of the file.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0 }
    }

    /// Create a tailer positioned at the file's current end, so content
    /// already present is never replayed. A missing file starts at 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but its length cannot be read.
    pub fn at_end(path: PathBuf) -> Result<Self, TailError> {
        let offset = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(TailError::Io(e)),
        };
        Ok(Self { path, offset })
    }

    /// Get the current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the path being tailed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all complete lines appended since the last read.
    ///
    /// The file is opened read-only for each read, so a concurrent writer
    /// is never blocked. If the file shrank below the consumed offset
    /// (log rotation), the offset is reset to 0 and reading restarts from
    /// the beginning. Line terminators are stripped from returned lines.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or read; callers
    /// driving the tailer from change notifications treat this as
    /// transient and retry on the next notification.
    pub async fn read_new_lines(&mut self) -> Result<Vec<String>, TailError> {
        let file = File::open(&self.path).await?;
        let file_len = file.metadata().await?.len();

        if file_len < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = file_len,
                "Log file truncated, resetting offset"
            );
            self.offset = 0;
        }

        if file_len == self.offset {
            return Ok(Vec::new());
        }

        let mut file = file;
        file.seek(std::io::SeekFrom::Start(self.offset)).await?;

        let mut reader = BufReader::new(file);
        let mut lines = Vec::new();
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                break;
            }
            if !line.ends_with('\n') {
                // Write in progress: the unterminated tail is not consumed.
                break;
            }

            self.offset += bytes_read as u64;
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }

        Ok(lines)
    }
}
