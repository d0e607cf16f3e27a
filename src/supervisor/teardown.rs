//! Idempotent teardown of supervision resources.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::tail::LogWatcher;

/// Coordinates release of everything a launch holds: the log watcher
/// and the shutdown token the exit monitor listens on.
///
/// Release is triggered by whichever comes first of readiness, process
/// exit, and explicit stop. Every release path is idempotent and safe
/// to invoke concurrently with an in-flight notification handler.
#[derive(Debug, Default)]
pub struct Teardown {
    released: AtomicBool,
    shutdown: CancellationToken,
    watcher: Mutex<Option<LogWatcher>>,
}

impl Teardown {
    /// Create a teardown with nothing to release yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token the exit monitor listens on; cancelled by [`release`].
    ///
    /// [`release`]: Teardown::release
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Hand the log watcher over for later release.
    ///
    /// When release already happened (a stop racing a slow start), the
    /// watcher is stopped on the spot instead of being kept.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn adopt_watcher(&self, watcher: LogWatcher) {
        let mut slot = self.watcher.lock().expect("teardown mutex poisoned");
        if self.released.load(Ordering::SeqCst) {
            watcher.stop();
            return;
        }
        *slot = Some(watcher);
    }

    /// Stop and drop the log watcher, leaving the server running.
    ///
    /// Invoked on readiness: tailing is over but the process lives on.
    /// Redundant and concurrent calls are no-ops.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn release_watcher(&self) {
        if let Some(watcher) = self
            .watcher
            .lock()
            .expect("teardown mutex poisoned")
            .take()
        {
            watcher.stop();
        }
    }

    /// Release everything: stop the watcher and cancel the shutdown
    /// token so the exit monitor terminates the process.
    ///
    /// Invoked from explicit stop, process exit, and drop. Idempotent.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("Releasing supervision resources");
        self.shutdown.cancel();
        self.release_watcher();
    }

    /// Whether full release has happened.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}
