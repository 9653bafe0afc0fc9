//! Error types for the startup orchestrator

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while bringing the server up
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// A file operation failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The mount table could not be read
    #[error("Cannot read mount table {path}: {source}")]
    MountTable {
        /// Mount table path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The plugin installer ran but reported failure
    #[error("Plugin installer '{program}' failed: {status}")]
    PluginInstall {
        /// Installer executable
        program: String,
        /// Its exit status
        status: ExitStatus,
    },

    /// A process could not be started
    #[error("Cannot start '{program}': {source}")]
    Spawn {
        /// Executable
        program: String,
        /// Underlying error
        source: io::Error,
    },

    /// The server process ended before it became ready
    #[error("Server exited before becoming ready: {0}")]
    ServerExited(ExitStatus),

    /// The server did not become ready before the deadline
    #[error("Server not ready after {waited:?} ({attempts} checks): waiting for {what}")]
    ReadyTimeout {
        /// What readiness was being waited on
        what: String,
        /// Time spent waiting
        waited: Duration,
        /// Number of checks performed
        attempts: u32,
    },
}

impl OrchestratorError {
    /// Builds a mapper from `io::Error` that records `path`
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Result alias for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
