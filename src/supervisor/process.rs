//! Server process spawning and control.
//!
//! Assembles the launch command line from a resolved [`ProcessConfig`]
//! and wraps the running child with control methods, including graceful
//! termination.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::config::ProcessConfig;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The server executable was not found.
    #[error("Server executable not found: {path}")]
    NotFound {
        /// Executable that was launched.
        path: PathBuf,
    },
    /// Permission denied when spawning.
    #[error("Permission denied launching {path}")]
    PermissionDenied {
        /// Executable that was launched.
        path: PathBuf,
    },
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io(err),
        }
    }
}

/// Where a line of server output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSource {
    /// Piped child stdout.
    Stdout,
    /// The tailed log file.
    LogFile,
}

impl fmt::Display for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::LogFile => write!(f, "log file"),
        }
    }
}

/// A single line of server output, tagged with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// Line content with the trailing newline stripped.
    pub text: String,
    /// Which line source produced it.
    pub source: LineSource,
}

impl OutputLine {
    /// Wrap a line of output.
    #[must_use]
    pub fn new(text: impl Into<String>, source: LineSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// The assembled command line for launching the server.
///
/// Arguments are the caller's pass-through arguments followed by the
/// fixed flags pointing the runtime at the entry script and the
/// resolved config file.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    executable: PathBuf,
    args: Vec<OsString>,
    working_dir: PathBuf,
}

impl ServerCommand {
    /// Assemble the command line from a resolved configuration.
    #[must_use]
    pub fn from_config(config: &ProcessConfig) -> Self {
        let mut args: Vec<OsString> = config.extra_args.iter().map(OsString::from).collect();
        args.push(OsString::from("--no-warnings"));
        args.push(config.entry_script.clone().into_os_string());
        args.push(OsString::from("--config"));
        args.push(config.config_file.clone().into_os_string());

        Self {
            executable: config.executable.clone(),
            args,
            working_dir: config.home_dir.clone(),
        }
    }

    /// The executable to launch.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// The full argument list.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// The working directory the process starts in.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

/// A running server process.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
}

impl ServerProcess {
    /// Spawn the server process.
    ///
    /// stdin is always closed and stderr is always piped. stdout is
    /// piped when `capture_stdout` is set (readiness comes from stdout)
    /// and discarded otherwise (readiness comes from the log file).
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(command: &ServerCommand, capture_stdout: bool) -> Result<Self, SpawnError> {
        let mut cmd = Command::new(&command.executable);
        cmd.args(&command.args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(if capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_io(e, &command.executable))?;

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`, as
    /// do all calls when stdout was not captured.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.id() {
            let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            let _ = kill(nix_pid, Signal::SIGTERM);

            let wait_result = tokio::time::timeout(timeout, self.child.wait()).await;

            match wait_result {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(_) => {
                    // SIGTERM was ignored, force kill
                    self.child.kill().await
                }
            }
        } else {
            // Process already exited
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogDestination, Product};

    fn test_config(extra_args: Vec<String>) -> ProcessConfig {
        ProcessConfig {
            product: Product::new("kibana"),
            home_dir: PathBuf::from("/opt/kibana"),
            config_dir: PathBuf::from("/opt/kibana/config"),
            config_file: PathBuf::from("/opt/kibana/config/kibana.yml"),
            executable: PathBuf::from("/opt/kibana/node/node"),
            entry_script: PathBuf::from("/opt/kibana/src/cli"),
            log_destination: LogDestination::Stdout,
            extra_args,
        }
    }

    #[test]
    fn test_fixed_flags_follow_extra_args() {
        let config = test_config(vec!["--verbose".to_string(), "--quiet".to_string()]);
        let command = ServerCommand::from_config(&config);

        let args = command.args();
        assert_eq!(args.len(), 6);
        assert_eq!(args[0], OsString::from("--verbose"));
        assert_eq!(args[1], OsString::from("--quiet"));
        assert_eq!(args[2], OsString::from("--no-warnings"));
        assert_eq!(args[3], OsString::from("/opt/kibana/src/cli"));
        assert_eq!(args[4], OsString::from("--config"));
        assert_eq!(args[5], OsString::from("/opt/kibana/config/kibana.yml"));
    }

    #[test]
    fn test_fixed_flags_alone_without_extra_args() {
        let config = test_config(Vec::new());
        let command = ServerCommand::from_config(&config);

        assert_eq!(command.args().len(), 4);
        assert_eq!(command.args()[0], OsString::from("--no-warnings"));
    }

    #[test]
    fn test_command_paths_come_from_config() {
        let config = test_config(Vec::new());
        let command = ServerCommand::from_config(&config);

        assert_eq!(command.executable(), Path::new("/opt/kibana/node/node"));
        assert_eq!(command.working_dir(), Path::new("/opt/kibana"));
    }

    #[test]
    fn test_spawn_error_display() {
        let err = SpawnError::NotFound {
            path: PathBuf::from("/opt/kibana/node/node"),
        };
        assert_eq!(
            err.to_string(),
            "Server executable not found: /opt/kibana/node/node"
        );
    }

    #[test]
    fn test_line_source_display() {
        assert_eq!(LineSource::Stdout.to_string(), "stdout");
        assert_eq!(LineSource::LogFile.to_string(), "log file");
    }

    #[test]
    fn test_output_line_new() {
        let line = OutputLine::new("server log line", LineSource::LogFile);
        assert_eq!(line.text, "server log line");
        assert_eq!(line.source, LineSource::LogFile);
    }
}
