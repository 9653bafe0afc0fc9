//! Bootstrap artifacts found on the configuration volume
//!
//! Two optional files are recognized at the mount root:
//!
//! | File | Effect |
//! |------|--------|
//! | `setup.groovy` | copied into the init script directory, run by the server at start |
//! | `plugins.txt` | handed to the plugin installer |
//!
//! Absent or empty files are skipped. Once anything has been applied a
//! marker file is written to the Jenkins home, and later starts of the same
//! container apply nothing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::infrastructure::Config;

use super::errors::{OrchestratorError, OrchestratorResult};

/// File name of the setup script
pub const SETUP_SCRIPT: &str = "setup.groovy";

/// File name of the plugin list
pub const PLUGIN_LIST: &str = "plugins.txt";

/// Installs the plugins named in a plugin list
#[async_trait]
pub trait PluginInstaller: Send + Sync {
    /// Installs every plugin listed in `plugin_list` into `plugin_dir`
    async fn install(&self, plugin_list: &Path, plugin_dir: &Path) -> OrchestratorResult<()>;
}

/// Runs an external installer such as `jenkins-plugin-cli`
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    program: String,
}

impl CommandInstaller {
    /// Installer running `program`
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Installer configured in `config`
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.plugin_installer.clone())
    }
}

#[async_trait]
impl PluginInstaller for CommandInstaller {
    async fn install(&self, plugin_list: &Path, plugin_dir: &Path) -> OrchestratorResult<()> {
        info!(installer = %self.program, list = %plugin_list.display(), "Installing plugins");
        let status = Command::new(&self.program)
            .arg("--plugin-file")
            .arg(plugin_list)
            .arg("--plugin-download-directory")
            .arg(plugin_dir)
            .status()
            .await
            .map_err(|source| OrchestratorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(OrchestratorError::PluginInstall {
                program: self.program.clone(),
                status,
            })
        }
    }
}

/// Where bootstrap artifacts are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapTarget {
    /// Init script directory
    pub init_dir: PathBuf,
    /// Plugin directory
    pub plugin_dir: PathBuf,
    /// Marker recording that bootstrap already happened
    pub marker: PathBuf,
}

impl BootstrapTarget {
    /// Locations inside the Jenkins home of `config`
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            init_dir: config.init_dir(),
            plugin_dir: config.plugin_dir(),
            marker: config.bootstrap_marker(),
        }
    }
}

/// What [`BootstrapArtifacts::apply`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Neither artifact was present
    NothingToApply,
    /// A previous start already applied the artifacts
    AlreadyApplied,
    /// Artifacts were applied now
    Applied {
        /// The setup script was installed
        setup_script: bool,
        /// The plugin list was installed
        plugins: bool,
    },
}

/// Non-empty artifacts found under a mount root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapArtifacts {
    /// `setup.groovy`, when present and non-empty
    pub setup_script: Option<PathBuf>,
    /// `plugins.txt`, when present and non-empty
    pub plugin_list: Option<PathBuf>,
}

fn non_empty_file(path: PathBuf) -> Option<PathBuf> {
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(path),
        Ok(_) => {
            debug!(path = %path.display(), "Skipping empty artifact");
            None
        }
        Err(_) => None,
    }
}

impl BootstrapArtifacts {
    /// Looks for the artifacts directly under `root`
    #[must_use]
    pub fn locate(root: &Path) -> Self {
        Self {
            setup_script: non_empty_file(root.join(SETUP_SCRIPT)),
            plugin_list: non_empty_file(root.join(PLUGIN_LIST)),
        }
    }

    /// True when no artifact was found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.setup_script.is_none() && self.plugin_list.is_none()
    }

    /// Applies the artifacts unless `target.marker` says it already happened
    ///
    /// # Errors
    ///
    /// Returns an error when a file cannot be copied or written, or when the
    /// installer fails. The marker is only written after success.
    pub async fn apply(
        &self,
        target: &BootstrapTarget,
        installer: &dyn PluginInstaller,
    ) -> OrchestratorResult<BootstrapOutcome> {
        if self.is_empty() {
            return Ok(BootstrapOutcome::NothingToApply);
        }
        if tokio::fs::try_exists(&target.marker)
            .await
            .map_err(OrchestratorError::io(&target.marker))?
        {
            info!(marker = %target.marker.display(), "Bootstrap already applied");
            return Ok(BootstrapOutcome::AlreadyApplied);
        }

        if let Some(script) = &self.setup_script {
            tokio::fs::create_dir_all(&target.init_dir)
                .await
                .map_err(OrchestratorError::io(&target.init_dir))?;
            let dest = target.init_dir.join(SETUP_SCRIPT);
            tokio::fs::copy(script, &dest)
                .await
                .map_err(OrchestratorError::io(&dest))?;
            info!(from = %script.display(), to = %dest.display(), "Installed setup script");
        }

        if let Some(list) = &self.plugin_list {
            tokio::fs::create_dir_all(&target.plugin_dir)
                .await
                .map_err(OrchestratorError::io(&target.plugin_dir))?;
            installer.install(list, &target.plugin_dir).await?;
        }

        if let Some(parent) = target.marker.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(OrchestratorError::io(parent))?;
        }
        tokio::fs::write(&target.marker, chrono::Utc::now().to_rfc3339())
            .await
            .map_err(OrchestratorError::io(&target.marker))?;

        Ok(BootstrapOutcome::Applied {
            setup_script: self.setup_script.is_some(),
            plugins: self.plugin_list.is_some(),
        })
    }
}
