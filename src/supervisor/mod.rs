//! Server process supervision.
//!
//! Launches a long-running server child and reports when it is ready
//! to accept connections, without polling any health endpoint. The
//! readiness signal is a line the server itself writes, either to its
//! stdout or to a log file it manages:
//!
//! - [`ServerCommand`] / [`ServerProcess`] build and spawn the child,
//! - [`parse_started_line`] recognizes the started confirmation,
//! - [`ReadySignal`] holds the [`SupervisorState`] machine,
//! - [`Teardown`] releases the watcher and the process exactly once,
//! - [`ServerSupervisor`] ties them together behind `start`,
//!   `wait_until_ready`, and `stop`.

mod process;
mod readiness;
mod runner;
mod state;
mod teardown;

pub use process::*;
pub use readiness::*;
pub use runner::*;
pub use state::*;
pub use teardown::*;
