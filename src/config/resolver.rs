//! Launch configuration resolution.
//!
//! Builds an immutable [`ProcessConfig`] from explicit overrides, the
//! product's environment variables, the raw argument list, and the
//! product settings file, in that order of precedence.

use std::path::{Path, PathBuf};

use super::{ConfigError, Environment, LogDestination, Product, ServerSettings};

/// Resolved launch configuration for one server process.
///
/// Built once at supervisor construction and immutable afterwards.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Product being launched.
    pub product: Product,
    /// Installation home directory.
    pub home_dir: PathBuf,
    /// Configuration directory.
    pub config_dir: PathBuf,
    /// Full path of the settings file inside the config directory.
    pub config_file: PathBuf,
    /// Bundled node runtime under the home directory.
    pub executable: PathBuf,
    /// CLI entry script handed to the runtime.
    pub entry_script: PathBuf,
    /// Where the server writes its log output.
    pub log_destination: LogDestination,
    /// Caller-supplied arguments passed through to the process.
    pub extra_args: Vec<String>,
}

/// Builder for resolving a [`ProcessConfig`].
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    product: Product,
    home_override: Option<PathBuf>,
    config_override: Option<PathBuf>,
    args: Vec<String>,
}

impl ConfigResolver {
    /// Create a resolver for the given product.
    #[must_use]
    pub fn new(product: Product) -> Self {
        Self {
            product,
            home_override: None,
            config_override: None,
            args: Vec::new(),
        }
    }

    /// Set an explicit home directory, taking precedence over the
    /// `<PRODUCT>_HOME` environment variable.
    #[must_use]
    pub fn home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_override = Some(dir.into());
        self
    }

    /// Set an explicit config directory, taking precedence over the
    /// `<PRODUCT>_CONFIG` environment variable.
    #[must_use]
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_override = Some(dir.into());
        self
    }

    /// Supply the raw argument list to scan and pass through.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve just the home and config directories.
    ///
    /// Home directory: explicit override, else `<PRODUCT>_HOME`, else the
    /// parent of the current working directory. Config directory: a
    /// `--config`/`-c` argument, else explicit override, else
    /// `<PRODUCT>_CONFIG`, else `<home>/config`. Trailing path separators
    /// are stripped from either.
    #[must_use]
    pub fn resolve_dirs(&self, env: &dyn Environment) -> (PathBuf, PathBuf) {
        let (argv_config, _) = scan_config_args(&self.args);

        let home_dir = self
            .home_override
            .clone()
            .or_else(|| env.var(&self.product.home_env_var()).map(PathBuf::from))
            .unwrap_or_else(working_dir_parent);
        let home_dir = strip_trailing_separators(&home_dir);

        let config_dir = argv_config
            .or_else(|| self.config_override.clone())
            .or_else(|| env.var(&self.product.config_env_var()).map(PathBuf::from))
            .unwrap_or_else(|| home_dir.join("config"));
        let config_dir = strip_trailing_separators(&config_dir);

        tracing::debug!(
            home = %home_dir.display(),
            config = %config_dir.display(),
            "Resolved directories"
        );
        (home_dir, config_dir)
    }

    /// Resolve the full launch configuration.
    ///
    /// Directories resolve as in [`resolve_dirs`], then the settings
    /// file inside the config directory is read for the logging
    /// destination.
    ///
    /// [`resolve_dirs`]: ConfigResolver::resolve_dirs
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the settings file is missing,
    /// unreadable, malformed, or names an invalid logging destination.
    pub fn resolve(self, env: &dyn Environment) -> Result<ProcessConfig, ConfigError> {
        let (home_dir, config_dir) = self.resolve_dirs(env);
        let (_, extra_args) = scan_config_args(&self.args);

        let config_file = config_dir.join(self.product.settings_file_name());
        let settings = ServerSettings::load(&config_file)?;
        let log_destination = settings.log_destination()?;

        Ok(ProcessConfig {
            executable: node_executable(&home_dir),
            entry_script: home_dir.join("src").join("cli"),
            product: self.product,
            home_dir,
            config_dir,
            config_file,
            log_destination,
            extra_args,
        })
    }
}

/// Scan the raw argument list for a `--config`/`-c` override.
///
/// The flag and the token after it are consumed; the override is that
/// next token. Everything else passes through order-preserving. A
/// trailing flag with no value is consumed without effect.
fn scan_config_args(args: &[String]) -> (Option<PathBuf>, Vec<String>) {
    let mut config = None;
    let mut passthrough = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" || arg == "-c" {
            if let Some(value) = iter.next() {
                config = Some(PathBuf::from(value));
            }
        } else {
            passthrough.push(arg.clone());
        }
    }
    (config, passthrough)
}

fn strip_trailing_separators(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let stripped = raw.trim_end_matches(['/', '\\']);
    if stripped.is_empty() {
        path.to_path_buf()
    } else {
        PathBuf::from(stripped)
    }
}

fn working_dir_parent() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.parent().map_or(cwd.clone(), Path::to_path_buf)
}

fn node_executable(home: &Path) -> PathBuf {
    let name = if cfg!(windows) { "node.exe" } else { "node" };
    home.join("node").join(name)
}
