//! Supervisor state machine and one-shot readiness signal.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::supervisor::ServerAddress;

/// Current state of a supervised server launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SupervisorState {
    /// `start` has not been called yet.
    #[default]
    NotStarted,
    /// The process is launched and the started line has not appeared.
    Starting,
    /// The server reported the address it listens on. Terminal.
    Ready(ServerAddress),
    /// The process went away before reporting ready. Terminal.
    Failed {
        /// Exit code, when the process exited cleanly enough to have one.
        exit_code: Option<i32>,
    },
}

impl SupervisorState {
    /// Whether this state can never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed { .. })
    }

    /// Whether the server reported ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The reported listening address, once ready.
    #[must_use]
    pub fn address(&self) -> Option<&ServerAddress> {
        match self {
            Self::Ready(address) => Some(address),
            _ => None,
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Starting => write!(f, "starting"),
            Self::Ready(address) => write!(f, "ready on {address}"),
            Self::Failed {
                exit_code: Some(code),
            } => write!(f, "failed (exit code {code})"),
            Self::Failed { exit_code: None } => write!(f, "failed"),
        }
    }
}

/// One-shot readiness signal backed by a watch channel.
///
/// Transitions go through [`watch::Sender::send_if_modified`], so they
/// are linearizable with respect to waiters waking up and each fires at
/// most once even when duplicate confirmations are handled concurrently.
/// Clones share the same underlying signal.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<SupervisorState>>,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    /// Create a signal in `NotStarted`.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SupervisorState::NotStarted);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.tx.borrow().clone()
    }

    /// Subscribe a waiter. The receiver observes the current state and
    /// every transition after it; any number of waiters may subscribe.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.tx.subscribe()
    }

    /// Move `NotStarted` to `Starting`.
    ///
    /// Returns `false` when startup was already begun.
    pub fn mark_starting(&self) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if matches!(state, SupervisorState::NotStarted) {
                *state = SupervisorState::Starting;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!(to = "Starting", "State transition");
        }
        changed
    }

    /// Record the readiness confirmation.
    ///
    /// Exactly one call can win; duplicates and calls in any state other
    /// than `Starting` are no-ops returning `false`.
    pub fn mark_ready(&self, address: ServerAddress) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if matches!(state, SupervisorState::Starting) {
                *state = SupervisorState::Ready(address.clone());
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!(to = "Ready", "State transition");
        }
        changed
    }

    /// Record that the process went away.
    ///
    /// Terminal states absorb this: a server exiting after readiness
    /// stays `Ready`, and only the first failure records its exit code.
    pub fn mark_failed(&self, exit_code: Option<i32>) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = SupervisorState::Failed { exit_code };
                true
            }
        });
        if changed {
            tracing::debug!(to = "Failed", ?exit_code, "State transition");
        }
        changed
    }
}
