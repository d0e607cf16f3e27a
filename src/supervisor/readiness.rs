//! Readiness confirmation parsing.
//!
//! Once fully initialized, the server announces the address it is
//! listening on with a single output line. Recognizing that line is the
//! only source of truth for "the server is ready"; nothing here polls
//! the server itself.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// The readiness marker word, as its own word anywhere in the line.
static STARTED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstarted\b").expect("marker pattern"));

/// A `host:port` listening address, optionally scheme-prefixed.
static LISTEN_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?://)?([A-Za-z0-9_.\-]+):(\d{1,5})").expect("address pattern")
});

/// The host and port a ready server reported it is listening on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    /// Hostname or IP literal.
    pub host: String,
    /// Listening port.
    pub port: u16,
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parse one line of server output for the readiness confirmation.
///
/// A line confirms readiness when the marker word `started` appears and
/// a listening address follows it. Surrounding log noise (timestamps,
/// level tags, brackets) is ignored. Returns `None` for blank lines,
/// lines without the marker, and lines whose candidate ports do not fit
/// in a `u16`.
///
/// Pure and idempotent; parsing the same line twice yields the same
/// result.
#[must_use]
pub fn parse_started_line(line: &str) -> Option<ServerAddress> {
    let marker = STARTED_MARKER.find(line)?;
    let rest = &line[marker.end()..];

    LISTEN_ADDRESS.captures_iter(rest).find_map(|caps| {
        let host = caps.get(1)?.as_str().to_string();
        let port = caps.get(2)?.as_str().parse::<u16>().ok()?;
        Some(ServerAddress { host, port })
    })
}
