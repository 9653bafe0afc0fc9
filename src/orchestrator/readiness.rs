//! Waiting for the server to come up

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::polling::{PollError, RetryPolicy, poll_until};

use super::errors::{OrchestratorError, OrchestratorResult};
use super::launcher::ServerProcess;

/// Line the server logs once it has finished starting
pub const READY_MARKER: &str = "Jenkins is fully up and running";

/// A condition signalling that the server is usable
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    /// What is being waited for, for logs and errors
    fn description(&self) -> String;

    /// Whether the condition holds now
    async fn is_ready(&self) -> OrchestratorResult<bool>;
}

#[derive(Debug, Default)]
struct ScanState {
    offset: u64,
    carry: String,
}

/// Watches a log file for a marker string
///
/// Each check reads only what was appended since the previous one. A marker
/// split across two writes is still found, and a file that shrinks is
/// rescanned from the start.
#[derive(Debug)]
pub struct LogMarker {
    path: PathBuf,
    marker: String,
    state: Mutex<ScanState>,
}

impl LogMarker {
    /// Watches `path` for `marker`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, marker: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            marker: marker.into(),
            state: Mutex::new(ScanState::default()),
        }
    }

    /// Watches `path` for [`READY_MARKER`]
    #[must_use]
    pub fn jenkins(path: impl Into<PathBuf>) -> Self {
        Self::new(path, READY_MARKER)
    }

    /// Ignores the first `offset` bytes, e.g. output of an earlier run
    #[must_use]
    pub fn starting_at(self, offset: u64) -> Self {
        self.state.lock().offset = offset;
        self
    }

    fn scan(&self) -> std::io::Result<bool> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        let mut state = self.state.lock();
        let len = file.metadata()?.len();
        if len < state.offset {
            debug!(path = %self.path.display(), "Log file truncated, rescanning");
            *state = ScanState::default();
        }

        file.seek(SeekFrom::Start(state.offset))?;
        let mut appended = Vec::new();
        let read = file.read_to_end(&mut appended)?;
        state.offset += read as u64;

        let mut text = std::mem::take(&mut state.carry);
        text.push_str(&String::from_utf8_lossy(&appended));
        if text.contains(&self.marker) {
            return Ok(true);
        }

        let mut keep_from = text.len().saturating_sub(self.marker.len().saturating_sub(1));
        while !text.is_char_boundary(keep_from) {
            keep_from += 1;
        }
        state.carry = text.split_off(keep_from);
        Ok(false)
    }
}

#[async_trait]
impl ReadinessCheck for LogMarker {
    fn description(&self) -> String {
        format!("'{}' in {}", self.marker, self.path.display())
    }

    async fn is_ready(&self) -> OrchestratorResult<bool> {
        self.scan().map_err(OrchestratorError::io(&self.path))
    }
}

/// Waits for a file to exist with some content
#[derive(Debug, Clone)]
pub struct FileExists {
    path: PathBuf,
}

impl FileExists {
    /// Waits for `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Watched path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReadinessCheck for FileExists {
    fn description(&self) -> String {
        self.path.display().to_string()
    }

    async fn is_ready(&self) -> OrchestratorResult<bool> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.is_file() && meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(OrchestratorError::io(&self.path)(e)),
        }
    }
}

/// Polls `check` until it holds
///
/// Gives up early when `server` exits, since it will never become ready.
///
/// # Errors
///
/// [`OrchestratorError::ServerExited`] when the server process ends,
/// [`OrchestratorError::ReadyTimeout`] when the policy deadline passes, or
/// the error of the check itself.
pub async fn wait_ready(
    check: &dyn ReadinessCheck,
    server: &ServerProcess,
    policy: &RetryPolicy,
) -> OrchestratorResult<()> {
    info!(waiting_for = %check.description(), timeout = ?policy.timeout, "Waiting for server");
    poll_until(policy, || async move {
        if let Some(status) = server.exit_status()? {
            return Err(OrchestratorError::ServerExited(status));
        }
        Ok(check.is_ready().await?.then_some(()))
    })
    .await
    .map_err(|e| match e {
        PollError::Probe(e) => e,
        PollError::TimedOut { waited, attempts } => OrchestratorError::ReadyTimeout {
            what: check.description(),
            waited,
            attempts,
        },
    })?;
    info!(ready = %check.description(), "Server is ready");
    Ok(())
}
