//! Container startup orchestration
//!
//! Brings a Jenkins server up inside a container and then hands the
//! terminal to a command or a shell:
//!
//! 1. decide the [`StartupMode`] from the configuration;
//! 2. unattended only: discover the configuration volume and apply the
//!    [`BootstrapArtifacts`] found there;
//! 3. launch the server with its output going to the log file;
//! 4. wait until the admin password file exists (interactive) or the log
//!    shows the readiness marker (unattended), then print the password in
//!    interactive mode;
//! 5. run the handoff command and stop the server when it returns.

mod bootstrap;
mod errors;
mod handoff;
mod launcher;
mod mode;
mod mounts;
mod readiness;

use std::io::Write;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use tracing::{info, warn};

use crate::infrastructure::Config;

pub use bootstrap::{
    BootstrapArtifacts, BootstrapOutcome, BootstrapTarget, CommandInstaller, PLUGIN_LIST,
    PluginInstaller, SETUP_SCRIPT,
};
pub use errors::{OrchestratorError, OrchestratorResult};
pub use handoff::Handoff;
pub use launcher::{SKIP_SETUP_WIZARD, ServerCommand, ServerProcess};
pub use mode::StartupMode;
pub use mounts::{
    MountEntry, MountFilter, MountRoot, MountSource, PSEUDO_FILESYSTEMS, discover_from_table,
    discover_mount_root, parse_mount_table,
};
pub use readiness::{FileExists, LogMarker, READY_MARKER, ReadinessCheck, wait_ready};

/// Writes the trimmed admin password at `path` to `out`
async fn print_secret(path: &Path, out: &mut impl Write) -> OrchestratorResult<()> {
    let secret = tokio::fs::read_to_string(path)
        .await
        .map_err(OrchestratorError::io(path))?;
    info!(path = %path.display(), "Initial admin password");
    writeln!(out, "{}", secret.trim())
        .and_then(|()| out.flush())
        .map_err(OrchestratorError::io("<stdout>"))
}

/// Drives a server from launch to handoff
#[derive(Debug)]
pub struct Orchestrator<I: PluginInstaller = CommandInstaller> {
    config: Config,
    mode: StartupMode,
    installer: I,
    server: ServerCommand,
    shutdown_grace: Duration,
}

impl Orchestrator<CommandInstaller> {
    /// Orchestrator running Jenkins as described by `config`
    #[must_use]
    pub fn new(config: Config) -> Self {
        let mode = StartupMode::from_config(&config);
        Self {
            installer: CommandInstaller::from_config(&config),
            server: ServerCommand::jenkins(&config, mode),
            mode,
            config,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl<I: PluginInstaller> Orchestrator<I> {
    /// Replaces the plugin installer
    #[must_use]
    pub fn with_installer<J: PluginInstaller>(self, installer: J) -> Orchestrator<J> {
        Orchestrator {
            config: self.config,
            mode: self.mode,
            installer,
            server: self.server,
            shutdown_grace: self.shutdown_grace,
        }
    }

    /// Replaces the server command
    #[must_use]
    pub fn with_server_command(mut self, server: ServerCommand) -> Self {
        self.server = server;
        self
    }

    /// How long the server gets to exit after SIGTERM
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Selected startup mode
    #[must_use]
    pub fn mode(&self) -> StartupMode {
        self.mode
    }

    /// Effective configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Server command that [`launch`](Self::launch) runs
    #[must_use]
    pub fn server_command(&self) -> &ServerCommand {
        &self.server
    }

    /// Configuration volume; the default mount when the table is unreadable
    #[must_use]
    pub fn discover_mount(&self) -> MountRoot {
        let filter = MountFilter::from_config(&self.config);
        discover_from_table(&self.config.mount_table, &filter, &self.config.default_mount)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Mount discovery failed, using default");
                discover_mount_root(&[], &filter, &self.config.default_mount)
            })
    }

    /// Applies the artifacts found on the configuration volume
    ///
    /// # Errors
    ///
    /// See [`BootstrapArtifacts::apply`].
    pub async fn bootstrap(&self) -> OrchestratorResult<BootstrapOutcome> {
        let root = self.discover_mount();
        let artifacts = BootstrapArtifacts::locate(&root.path);
        let outcome = artifacts
            .apply(&BootstrapTarget::from_config(&self.config), &self.installer)
            .await?;
        info!(mount = %root, ?outcome, "Bootstrap finished");
        Ok(outcome)
    }

    /// Starts the server and waits until it is ready
    ///
    /// # Errors
    ///
    /// Returns the launch or readiness error; the server is stopped first.
    pub async fn launch(&self) -> OrchestratorResult<ServerProcess> {
        let log = self.config.log_file_path();
        let previous_output = std::fs::metadata(&log).map_or(0, |m| m.len());
        let server = self.server.spawn(&log)?;

        let check: Box<dyn ReadinessCheck> = match self.mode {
            StartupMode::Interactive => Box::new(FileExists::new(self.config.secret_file())),
            StartupMode::Unattended => {
                Box::new(LogMarker::jenkins(&log).starting_at(previous_output))
            }
        };

        if let Err(e) = wait_ready(check.as_ref(), &server, &self.config.ready_policy()).await {
            if let Err(stop) = server.shutdown(self.shutdown_grace).await {
                warn!(error = %stop, "Failed to stop server");
            }
            return Err(e);
        }
        Ok(server)
    }

    /// Runs the whole startup sequence and returns the handoff exit status
    ///
    /// `args` is the handoff command; empty means an interactive shell.
    ///
    /// # Errors
    ///
    /// Returns the first bootstrap, launch, readiness or handoff error.
    pub async fn run(self, args: Vec<String>) -> OrchestratorResult<ExitStatus> {
        info!(mode = %self.mode, "Starting Jenkins");
        if self.mode == StartupMode::Unattended {
            self.bootstrap().await?;
        }

        let server = self.launch().await?;

        let result = match self.mode {
            StartupMode::Interactive => {
                print_secret(&self.config.secret_file(), &mut std::io::stdout()).await
            }
            StartupMode::Unattended => Ok(()),
        };
        let result = match result {
            Ok(()) => Handoff::from_args(args, &self.config.shell).run().await,
            Err(e) => Err(e),
        };

        match server.shutdown(self.shutdown_grace).await {
            Ok(status) => info!(%status, "Server stopped"),
            Err(e) => warn!(error = %e, "Failed to stop server"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_print_secret_trims_password() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("initialAdminPassword");
        std::fs::write(&path, "  0f3c9a\n\n").unwrap();
        let mut out = Vec::new();

        print_secret(&path, &mut out).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "0f3c9a\n");
    }

    #[tokio::test]
    async fn test_print_secret_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("initialAdminPassword");
        let mut out = Vec::new();

        let err = print_secret(&path, &mut out).await.unwrap_err();

        assert!(matches!(err, OrchestratorError::Io { path: p, .. } if p == path));
        assert!(out.is_empty());
    }
}
