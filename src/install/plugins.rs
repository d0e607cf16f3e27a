//! Removal of previously installed server plugins.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{ProcessConfig, Product};

use super::ProgressReporter;

/// Progress weight charged per plugin, one entry per removal phase:
/// announce, tool run, confirm.
const PHASE_WEIGHTS: [u32; 3] = [20, 1930, 50];

/// Task name reported to the progress sink.
const ACTION_NAME: &str = "remove-plugins";

/// Errors from plugin operations.
#[derive(thiserror::Error, Debug)]
pub enum PluginError {
    /// The installed plugin listing failed.
    #[error("Failed to list installed plugins: {0}")]
    ListFailed(String),
    /// The plugin tool refused to remove a plugin.
    #[error("Failed to remove plugin {name}: {reason}")]
    RemoveFailed {
        /// Plugin the tool was asked to remove.
        name: String,
        /// What the tool reported.
        reason: String,
    },
    /// The plugin tool could not be invoked at all.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Abstraction over the server's plugin tool.
#[async_trait]
pub trait PluginManager: Send + Sync {
    /// Names of the plugins currently installed under `home_dir`.
    async fn installed_plugins(
        &self,
        home_dir: &Path,
        config_dir: &Path,
    ) -> Result<Vec<String>, PluginError>;

    /// Remove one plugin, charging `weight` progress units for the
    /// underlying tool run.
    async fn remove(
        &self,
        weight: u32,
        home_dir: &Path,
        config_dir: &Path,
        name: &str,
        extra_args: &[String],
    ) -> Result<(), PluginError>;
}

/// Plugin manager backed by the product's bundled plugin tool,
/// `bin/<product>-plugin` under the home directory.
pub struct PluginTool {
    product: Product,
    reporter: Arc<dyn ProgressReporter>,
}

impl PluginTool {
    /// Create a plugin tool wrapper for a product.
    #[must_use]
    pub fn new(product: Product, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { product, reporter }
    }

    fn tool_path(&self, home_dir: &Path) -> PathBuf {
        home_dir
            .join("bin")
            .join(format!("{}-plugin", self.product.name()))
    }
}

impl fmt::Debug for PluginTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginTool")
            .field("product", &self.product)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PluginManager for PluginTool {
    async fn installed_plugins(
        &self,
        home_dir: &Path,
        config_dir: &Path,
    ) -> Result<Vec<String>, PluginError> {
        let output = Command::new(self.tool_path(home_dir))
            .arg("list")
            .env(self.product.config_env_var(), config_dir)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PluginError::ListFailed(stderr.trim().to_string()));
        }

        // The tool prints one `name@version` per line
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.split('@').next().unwrap_or(line).trim().to_string())
            .collect())
    }

    async fn remove(
        &self,
        weight: u32,
        home_dir: &Path,
        config_dir: &Path,
        name: &str,
        extra_args: &[String],
    ) -> Result<(), PluginError> {
        let output = Command::new(self.tool_path(home_dir))
            .arg("remove")
            .arg(name)
            .args(extra_args)
            .env(self.product.config_env_var(), config_dir)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PluginError::RemoveFailed {
                name: name.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        self.reporter
            .advance(weight, &format!("plugin {name} removed"));
        Ok(())
    }
}

/// Installer task that removes every previously installed plugin.
///
/// Thin orchestration over a [`PluginManager`]: enumerate, then remove
/// one plugin at a time, charging the fixed phase weights. With no
/// plugins installed the task succeeds without touching the progress
/// reporter at all.
#[derive(Debug, Clone)]
pub struct RemovePluginsTask {
    product: Product,
    home_dir: PathBuf,
    config_dir: PathBuf,
}

impl RemovePluginsTask {
    /// Create a task for the given product directories.
    #[must_use]
    pub fn new(product: Product, home_dir: PathBuf, config_dir: PathBuf) -> Self {
        Self {
            product,
            home_dir,
            config_dir,
        }
    }

    /// Create a task from a resolved process configuration.
    #[must_use]
    pub fn from_config(config: &ProcessConfig) -> Self {
        Self::new(
            config.product.clone(),
            config.home_dir.clone(),
            config.config_dir.clone(),
        )
    }

    /// Total weight this task will report for `plugin_count` plugins.
    #[must_use]
    pub fn total_weight(plugin_count: usize) -> u32 {
        let per_plugin: u32 = PHASE_WEIGHTS.iter().sum();
        u32::try_from(plugin_count)
            .unwrap_or(u32::MAX)
            .saturating_mul(per_plugin)
    }

    /// Remove all installed plugins, reporting progress along the way.
    ///
    /// Returns the number of plugins removed. Stops at the first
    /// removal failure, leaving any remaining plugins in place.
    ///
    /// # Errors
    ///
    /// Propagates listing and removal failures from the manager.
    pub async fn execute(
        &self,
        manager: &dyn PluginManager,
        reporter: &dyn ProgressReporter,
    ) -> Result<usize, PluginError> {
        let plugins = manager
            .installed_plugins(&self.home_dir, &self.config_dir)
            .await?;
        if plugins.is_empty() {
            tracing::info!("No existing plugins to remove");
            return Ok(0);
        }

        let config_file = self.config_dir.join(self.product.settings_file_name());
        let extra_args = vec!["--config".to_string(), config_file.display().to_string()];

        reporter.begin(
            Self::total_weight(plugins.len()),
            ACTION_NAME,
            &format!("Removing existing {} plugins", self.product.name()),
            &format!("{} plugin: [1]", self.product.name()),
        );
        for plugin in &plugins {
            reporter.advance(PHASE_WEIGHTS[0], &format!("removing {plugin}"));
            manager
                .remove(
                    PHASE_WEIGHTS[1],
                    &self.home_dir,
                    &self.config_dir,
                    plugin,
                    &extra_args,
                )
                .await?;
            reporter.advance(PHASE_WEIGHTS[2], &format!("removed {plugin}"));
        }

        tracing::info!(count = plugins.len(), "Removed existing plugins");
        Ok(plugins.len())
    }
}
