//! Product settings file parsing.
//!
//! Reads `<config dir>/<product>.yml` for the logging destination. A
//! missing or unreadable settings file is a fatal configuration error
//! surfaced at resolve time, before any process is launched.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::Product;

/// Settings value meaning "read the process's own standard output
/// instead of tailing a log file".
pub const STDOUT_SENTINEL: &str = "stdout";

/// Errors that can occur during configuration resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file missing or unreadable.
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Settings file is not valid YAML.
    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// Logging destination is neither the sentinel nor an absolute path.
    #[error("Invalid logging destination {dest:?}: expected \"stdout\" or an absolute file path")]
    InvalidLogDestination { dest: String },
}

/// Where the server writes its log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// The `stdout` sentinel: readiness is detected from the process's
    /// own standard output and no file is tailed.
    Stdout,
    /// Absolute path of the log file to tail for readiness.
    File(PathBuf),
}

impl LogDestination {
    /// Parse a raw settings value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidLogDestination` when the value is
    /// empty or a relative path.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed == STDOUT_SENTINEL {
            return Ok(Self::Stdout);
        }
        let path = PathBuf::from(trimmed);
        if trimmed.is_empty() || !path.is_absolute() {
            return Err(ConfigError::InvalidLogDestination {
                dest: raw.to_string(),
            });
        }
        Ok(Self::File(path))
    }

    /// Whether this is the stdout sentinel.
    #[must_use]
    pub fn is_stdout(&self) -> bool {
        matches!(self, Self::Stdout)
    }
}

impl std::fmt::Display for LogDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "{STDOUT_SENTINEL}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Parsed contents of the product settings file.
///
/// Accepts both the nested form (`logging:` / `  dest:`) and the flat
/// dotted key (`logging.dest:`) commonly written in product yml files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    logging: LoggingSection,
    #[serde(rename = "logging.dest")]
    logging_dest_flat: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LoggingSection {
    dest: Option<String>,
}

impl ServerSettings {
    /// Load settings from a file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` when the file is missing or
    /// unreadable, `ConfigError::Parse` when it is not valid YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `<product>.yml` from a config directory.
    ///
    /// # Errors
    ///
    /// Same as [`ServerSettings::load`].
    pub fn from_dir(config_dir: &Path, product: &Product) -> Result<Self, ConfigError> {
        Self::load(&config_dir.join(product.settings_file_name()))
    }

    /// The raw logging destination, defaulting to the stdout sentinel
    /// when the key is absent.
    #[must_use]
    pub fn logging_destination(&self) -> &str {
        self.logging_dest_flat
            .as_deref()
            .or(self.logging.dest.as_deref())
            .unwrap_or(STDOUT_SENTINEL)
    }

    /// The typed logging destination.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidLogDestination` for a malformed value.
    pub fn log_destination(&self) -> Result<LogDestination, ConfigError> {
        LogDestination::parse(self.logging_destination())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_settings(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{content}").unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = ServerSettings::load(Path::new("/nonexistent/kibana.yml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_malformed_yaml_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, "kibana.yml", "logging: [unclosed");
        let result = ServerSettings::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_nested_logging_dest() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, "kibana.yml", "logging:\n  dest: /var/log/kibana.log\n");
        let settings = ServerSettings::load(&path).unwrap();
        assert_eq!(settings.logging_destination(), "/var/log/kibana.log");
    }

    #[test]
    fn test_flat_logging_dest() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, "kibana.yml", "logging.dest: stdout\n");
        let settings = ServerSettings::load(&path).unwrap();
        assert_eq!(settings.logging_destination(), "stdout");
        assert!(settings.log_destination().unwrap().is_stdout());
    }

    #[test]
    fn test_absent_key_defaults_to_stdout() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, "kibana.yml", "server.port: 5601\n");
        let settings = ServerSettings::load(&path).unwrap();
        assert_eq!(settings.logging_destination(), STDOUT_SENTINEL);
    }

    #[test]
    fn test_from_dir_uses_product_file_name() {
        let dir = TempDir::new().unwrap();
        write_settings(&dir, "kibana.yml", "logging:\n  dest: stdout\n");
        let settings = ServerSettings::from_dir(dir.path(), &Product::new("kibana")).unwrap();
        assert!(settings.log_destination().unwrap().is_stdout());
    }

    #[test]
    fn test_destination_parse_rejects_relative_path() {
        let result = LogDestination::parse("logs/kibana.log");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidLogDestination { .. })
        ));
    }

    #[test]
    fn test_destination_parse_rejects_empty() {
        assert!(matches!(
            LogDestination::parse("   "),
            Err(ConfigError::InvalidLogDestination { .. })
        ));
    }

    #[test]
    fn test_destination_parse_absolute_file() {
        let dest = LogDestination::parse("/var/log/kibana.log").unwrap();
        assert_eq!(dest, LogDestination::File(PathBuf::from("/var/log/kibana.log")));
        assert!(!dest.is_stdout());
    }
}
