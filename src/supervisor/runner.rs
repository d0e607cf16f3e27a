//! Server supervisor orchestrating launch and readiness detection.
//!
//! Connects the process spawner, the output line source, and the
//! readiness state machine: one pump task routes every line through a
//! single handler, and an exit monitor owns the child process.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::{LogDestination, ProcessConfig};
use crate::display;
use crate::supervisor::{
    parse_started_line, LineSource, OutputLine, ReadySignal, ServerAddress, ServerCommand,
    ServerProcess, SpawnError, SupervisorState, Teardown,
};
use crate::tail::{LogWatcher, TailError};

/// Default timeout for graceful process termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum number of output lines kept for diagnostics.
const MAX_RECENT_OUTPUT: usize = 50;

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    /// `start` was called more than once.
    #[error("Server already started")]
    AlreadyStarted,
    /// `start` was called after `stop`.
    #[error("Supervisor already stopped")]
    Stopped,
    /// Process stdout was not available.
    #[error("Process stdout not available")]
    NoStdout,
    /// The child process could not be spawned.
    #[error("Failed to spawn server process: {0}")]
    Spawn(#[from] SpawnError),
    /// The log file could not be watched.
    #[error("Failed to watch log file: {0}")]
    Tail(#[from] TailError),
    /// The server did not report ready within the wait window.
    #[error("Server did not report ready within {timeout:?}")]
    Timeout {
        /// How long the wait lasted.
        timeout: Duration,
    },
    /// The server exited before reporting ready.
    #[error(
        "Server process exited before becoming ready (exit code {})",
        .exit_code.map_or_else(|| "unknown".to_string(), |code| code.to_string())
    )]
    ProcessExited {
        /// Exit code, when one was available.
        exit_code: Option<i32>,
    },
}

/// Supervisor for one server launch.
///
/// Spawns the process, routes its output lines through the readiness
/// handler, and resolves [`wait_until_ready`] callers the moment the
/// started line appears.
///
/// [`wait_until_ready`]: ServerSupervisor::wait_until_ready
#[derive(Debug)]
pub struct ServerSupervisor {
    config: ProcessConfig,
    signal: ReadySignal,
    teardown: Arc<Teardown>,
    recent_output: Arc<Mutex<VecDeque<String>>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl ServerSupervisor {
    /// Create a supervisor for a resolved configuration.
    #[must_use]
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            signal: ReadySignal::new(),
            teardown: Arc::new(Teardown::new()),
            recent_output: Arc::new(Mutex::new(VecDeque::new())),
            monitor: Mutex::new(None),
        }
    }

    /// The configuration this supervisor launches.
    #[must_use]
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Launch the server process and begin watching for readiness.
    ///
    /// Exactly one line source is chosen up front: when the resolved
    /// log destination is a file, a [`LogWatcher`] tails it from its
    /// current length (a stale started line from a previous run is
    /// never re-detected) and child stdout is discarded; for the stdout
    /// sentinel the piped child stdout is the source. stderr is always
    /// drained into the log.
    ///
    /// # Errors
    ///
    /// Returns an error when called twice, after `stop`, or when the
    /// process or log watcher cannot be started. Spawn and watch
    /// failures leave the supervisor in `Failed`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn start(&self) -> Result<(), StartupError> {
        if self.teardown.is_released() {
            return Err(StartupError::Stopped);
        }
        if !self.signal.mark_starting() {
            return Err(StartupError::AlreadyStarted);
        }

        let command = ServerCommand::from_config(&self.config);
        let capture_stdout = self.config.log_destination.is_stdout();

        let mut process = match ServerProcess::spawn(&command, capture_stdout) {
            Ok(process) => process,
            Err(e) => {
                self.signal.mark_failed(None);
                return Err(e.into());
            }
        };
        tracing::info!(
            executable = %self.config.executable.display(),
            pid = ?process.id(),
            "Spawned server process"
        );

        if let Some(stderr) = process.take_stderr() {
            tokio::spawn(drain_stderr(stderr));
        }

        let lines = match self.output_lines(&mut process) {
            Ok(lines) => lines,
            Err(e) => {
                self.signal.mark_failed(None);
                tokio::spawn(async move {
                    let _ = process.kill().await;
                });
                return Err(e);
            }
        };

        tokio::spawn(pump_output(
            lines,
            self.signal.clone(),
            Arc::clone(&self.teardown),
            Arc::clone(&self.recent_output),
        ));
        let monitor = tokio::spawn(monitor_exit(
            process,
            self.signal.clone(),
            Arc::clone(&self.teardown),
        ));
        *self.monitor.lock().expect("monitor mutex poisoned") = Some(monitor);

        Ok(())
    }

    /// Build the single line source for this launch.
    fn output_lines(
        &self,
        process: &mut ServerProcess,
    ) -> Result<BoxStream<'static, OutputLine>, StartupError> {
        match &self.config.log_destination {
            LogDestination::Stdout => {
                let stdout = process.take_stdout().ok_or(StartupError::NoStdout)?;
                Ok(stdout_lines(stdout).boxed())
            }
            LogDestination::File(path) => {
                tracing::info!(path = %path.display(), "Watching log file for readiness");
                let (watcher, rx) = LogWatcher::start(path)?;
                self.teardown.adopt_watcher(watcher);
                Ok(UnboundedReceiverStream::new(rx)
                    .map(|text| OutputLine::new(text, LineSource::LogFile))
                    .boxed())
            }
        }
    }

    /// Wait until the server reports ready or the timeout elapses.
    ///
    /// Returns the reported listening address. Never blocks when
    /// readiness was already signaled, and never busy-polls.
    ///
    /// # Errors
    ///
    /// [`StartupError::Timeout`] when the window elapses first; the
    /// supervisor remains in `Starting` and the wait may be retried.
    /// [`StartupError::ProcessExited`] when the process went away
    /// before reporting ready.
    pub async fn wait_until_ready(
        &self,
        timeout: Duration,
    ) -> Result<ServerAddress, StartupError> {
        let mut rx = self.signal.subscribe();
        let result = tokio::time::timeout(timeout, rx.wait_for(SupervisorState::is_terminal)).await;

        match result {
            Err(_) => Err(StartupError::Timeout { timeout }),
            Ok(Err(_)) => Err(StartupError::ProcessExited { exit_code: None }),
            Ok(Ok(state)) => match &*state {
                SupervisorState::Ready(address) => Ok(address.clone()),
                SupervisorState::Failed { exit_code } => Err(StartupError::ProcessExited {
                    exit_code: *exit_code,
                }),
                // wait_for only resolves on terminal states
                SupervisorState::NotStarted | SupervisorState::Starting => {
                    Err(StartupError::ProcessExited { exit_code: None })
                }
            },
        }
    }

    /// Stop the supervisor: terminate the child and release resources.
    ///
    /// Idempotent and callable from any state, including concurrently
    /// with in-flight output notifications. Returns without waiting for
    /// the child to exit; use [`shutdown`] to wait.
    ///
    /// [`shutdown`]: ServerSupervisor::shutdown
    pub fn stop(&self) {
        self.teardown.release();
    }

    /// Stop the supervisor and wait until the child has been reaped.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub async fn shutdown(&self) {
        self.stop();
        let monitor = self.monitor.lock().expect("monitor mutex poisoned").take();
        if let Some(monitor) = monitor {
            let _ = monitor.await;
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.signal.state()
    }

    /// The reported listening address, once ready.
    #[must_use]
    pub fn address(&self) -> Option<ServerAddress> {
        self.signal.state().address().cloned()
    }

    /// Most recent output lines, newest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn recent_output(&self, n: usize) -> Vec<String> {
        self.recent_output
            .lock()
            .expect("recent output mutex poisoned")
            .iter()
            .rev()
            .take(n)
            .cloned()
            .collect()
    }
}

impl Drop for ServerSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read lines from piped child stdout as a stream.
fn stdout_lines(stdout: ChildStdout) -> impl futures_core::Stream<Item = OutputLine> {
    let reader = BufReader::new(stdout).lines();
    futures_util::stream::unfold(reader, |mut reader| async {
        match reader.next_line().await {
            Ok(Some(line)) => Some((OutputLine::new(line, LineSource::Stdout), reader)),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Error reading server stdout");
                None
            }
        }
    })
}

/// Drain child stderr into the log.
async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            tracing::warn!(line = %line, "Server stderr");
        }
    }
}

/// Route every output line through the readiness handler.
async fn pump_output(
    mut lines: BoxStream<'static, OutputLine>,
    signal: ReadySignal,
    teardown: Arc<Teardown>,
    recent: Arc<Mutex<VecDeque<String>>>,
) {
    while let Some(line) = lines.next().await {
        handle_output_line(&line, &signal, &teardown, &recent);
    }
    tracing::debug!("Output line source ended");
}

/// The single message handler; idempotent after the first confirmation.
fn handle_output_line(
    line: &OutputLine,
    signal: &ReadySignal,
    teardown: &Teardown,
    recent: &Mutex<VecDeque<String>>,
) {
    if line.text.trim().is_empty() {
        return;
    }
    if signal.state().is_terminal() {
        // The launch outcome is settled; keep echoing, nothing else
        display::print_server_line(&line.text);
        return;
    }
    if let Some(address) = parse_started_line(&line.text) {
        if signal.mark_ready(address.clone()) {
            tracing::info!(
                host = %address.host,
                port = address.port,
                source = %line.source,
                "Server reported ready"
            );
            teardown.release_watcher();
        }
        return;
    }

    display::print_server_line(&line.text);
    tracing::debug!(line = %line.text, source = %line.source, "Server output");
    let mut recent = recent.lock().expect("recent output mutex poisoned");
    recent.push_back(line.text.clone());
    if recent.len() > MAX_RECENT_OUTPUT {
        recent.pop_front();
    }
}

/// Own the child for its lifetime: terminate on shutdown, record exit.
async fn monitor_exit(mut process: ServerProcess, signal: ReadySignal, teardown: Arc<Teardown>) {
    let shutdown = teardown.shutdown_token();

    tokio::select! {
        biased;

        () = shutdown.cancelled() => {
            tracing::info!("Stopping server process");
            signal.mark_failed(None);
            if let Err(e) = process.graceful_terminate(DEFAULT_TERMINATE_TIMEOUT).await {
                tracing::warn!(error = %e, "Failed to terminate server process");
            }
        }
        status = process.wait() => {
            match status {
                Ok(status) => {
                    let exit_code = status.code();
                    if signal.mark_failed(exit_code) {
                        tracing::warn!(?exit_code, "Server process exited before becoming ready");
                    } else {
                        tracing::info!(?exit_code, "Server process exited");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to wait for server process");
                    signal.mark_failed(None);
                }
            }
            teardown.release();
        }
    }
}
