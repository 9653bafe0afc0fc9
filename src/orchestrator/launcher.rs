//! Server process launch and shutdown

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::infrastructure::Config;

use super::errors::{OrchestratorError, OrchestratorResult};
use super::mode::StartupMode;

/// JVM option turning off the first-run setup wizard
pub const SKIP_SETUP_WIZARD: &str = "-Djenkins.install.runSetupWizard=false";

/// Program, arguments and extra environment of the server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    /// Executable
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Variables added to the inherited environment
    pub env: Vec<(String, String)>,
}

impl ServerCommand {
    /// Command running `program` without arguments
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Appends an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// `java <java_opts> [wizard off] -jar <war> <jenkins_opts>`
    #[must_use]
    pub fn jenkins(config: &Config, mode: StartupMode) -> Self {
        let mut command = Self::new(config.java.clone()).args(config.java_opts.iter().cloned());
        if mode.skips_setup_wizard() && !config.java_opts.iter().any(|o| o == SKIP_SETUP_WIZARD) {
            command = command.arg(SKIP_SETUP_WIZARD);
        }
        command
            .arg("-jar")
            .arg(config.war.display().to_string())
            .args(config.jenkins_opts.iter().cloned())
            .env("JENKINS_HOME", config.jenkins_home.display().to_string())
    }

    /// Starts the process with stdout and stderr appended to `log_file`
    ///
    /// # Errors
    ///
    /// Returns an error when the log file cannot be opened or the program
    /// cannot be started.
    pub fn spawn(&self, log_file: &Path) -> OrchestratorResult<ServerProcess> {
        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent).map_err(OrchestratorError::io(parent))?;
        }
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(OrchestratorError::io(log_file))?;
        let log_err = log.try_clone().map_err(OrchestratorError::io(log_file))?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OrchestratorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        info!(program = %self.program, pid = ?child.id(), log = %log_file.display(), "Server started");
        Ok(ServerProcess {
            child: Mutex::new(child),
            log_file: log_file.to_path_buf(),
        })
    }
}

/// A running server process
#[derive(Debug)]
pub struct ServerProcess {
    child: Mutex<Child>,
    log_file: PathBuf,
}

impl ServerProcess {
    /// OS process id, `None` once reaped
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.lock().id()
    }

    /// File receiving the server output
    #[must_use]
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Exit status if the process has ended, without blocking
    ///
    /// # Errors
    ///
    /// Propagates the error from querying the process.
    pub fn exit_status(&self) -> OrchestratorResult<Option<ExitStatus>> {
        self.child
            .lock()
            .try_wait()
            .map_err(OrchestratorError::io(&self.log_file))
    }

    /// Stops the server: SIGTERM, then SIGKILL if it outlives `grace`
    ///
    /// # Errors
    ///
    /// Propagates the error from waiting on the process.
    pub async fn shutdown(self, grace: Duration) -> OrchestratorResult<ExitStatus> {
        let mut child = self.child.into_inner();
        if let Some(status) = child.try_wait().map_err(OrchestratorError::io(&self.log_file))? {
            debug!(%status, "Server already exited");
            return Ok(status);
        }

        if let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) {
            debug!(pid, "Sending SIGTERM to server");
            if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
                warn!(pid, error = %e, "Failed to signal server");
            }
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => status.map_err(OrchestratorError::io(&self.log_file)),
            Err(_) => {
                warn!(grace = ?grace, "Server ignored SIGTERM, killing it");
                child
                    .kill()
                    .await
                    .map_err(OrchestratorError::io(&self.log_file))?;
                child.wait().await.map_err(OrchestratorError::io(&self.log_file))
            }
        }
    }
}
