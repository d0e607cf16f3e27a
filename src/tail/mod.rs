//! Log file tailing.
//!
//! A [`LogTailer`] tracks a byte offset into a growing log file and
//! reads the complete lines appended since the last read; a
//! [`LogWatcher`] drives one from filesystem notifications and streams
//! the lines over a channel.

mod error;
mod tailer;
mod watcher;

pub use error::*;
pub use tailer::*;
pub use watcher::*;
