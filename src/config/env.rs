//! Environment variable access.
//!
//! Resolution takes an [`Environment`] as an explicit input instead of
//! reading the process environment through globals, so tests can inject
//! values without mutating real process state.

use std::collections::HashMap;

/// Read access to environment variables.
pub trait Environment: Send + Sync {
    /// Look up a variable, returning `None` when unset or not valid unicode.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}
