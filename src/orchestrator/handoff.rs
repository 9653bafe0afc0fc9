//! Handing the terminal over once the server is up

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::info;

use super::errors::{OrchestratorError, OrchestratorResult};

/// What runs in the foreground after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff {
    /// A user-supplied command line
    Command(Vec<String>),
    /// An interactive shell
    Shell(PathBuf),
}

impl Handoff {
    /// The given command, or `shell` when there is none
    #[must_use]
    pub fn from_args(args: Vec<String>, shell: &Path) -> Self {
        if args.is_empty() {
            Self::Shell(shell.to_path_buf())
        } else {
            Self::Command(args)
        }
    }

    fn program(&self) -> String {
        match self {
            Self::Command(argv) => argv.first().cloned().unwrap_or_default(),
            Self::Shell(shell) => shell.display().to_string(),
        }
    }

    /// Runs in the foreground with the terminal attached and returns its
    /// exit status
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Spawn`] when the program cannot start.
    pub async fn run(&self) -> OrchestratorResult<ExitStatus> {
        let mut command = match self {
            Self::Command(argv) => {
                let (program, args) = argv.split_first().ok_or_else(|| OrchestratorError::Spawn {
                    program: String::new(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
                })?;
                let mut command = Command::new(program);
                command.args(args);
                command
            }
            Self::Shell(shell) => Command::new(shell),
        };
        info!(handoff = %self, "Handing over");

        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| OrchestratorError::Spawn {
                program: self.program(),
                source,
            })
    }
}

impl fmt::Display for Handoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(argv) => f.write_str(&shell_words::join(argv)),
            Self::Shell(shell) => write!(f, "{} (interactive shell)", shell.display()),
        }
    }
}
