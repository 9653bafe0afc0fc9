//! Error types for the Jenkins client

use thiserror::Error;

/// Errors returned by every Jenkins API call.
///
/// The host façade hands these back untouched, so callers see exactly what
/// the client saw.
#[derive(Error, Debug)]
pub enum JenkinsError {
    /// The request never got a response (DNS, refused connection, TLS...)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server URL could not be parsed
    #[error("Invalid Jenkins URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Credentials rejected or missing permission
    #[error("Unauthorized ({status}) for {url}")]
    Unauthorized {
        /// HTTP status (401 or 403)
        status: u16,
        /// Requested URL
        url: String,
    },

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A job with that name already exists
    #[error("Job '{0}' already exists")]
    AlreadyExists(String),

    /// Any other non-success status
    #[error("Unexpected status {status} for {url}: {body}")]
    UnexpectedStatus {
        /// HTTP status
        status: u16,
        /// Requested URL
        url: String,
        /// Response body, possibly truncated
        body: String,
    },

    /// The response body was not the JSON we expected
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// `build_job` did not return a usable queue location
    #[error("Missing or invalid queue location in response: {0:?}")]
    QueueLocation(Option<String>),

    /// The job configuration document could not be interpreted
    #[error("Invalid job configuration: {0}")]
    InvalidConfig(String),

    /// The queue item was cancelled before a build started
    #[error("Queue item {0} was cancelled")]
    Cancelled(u64),

    /// A queue item or build did not reach the awaited state in time
    #[error("Timed out after {waited:?} waiting for {what}")]
    WaitTimeout {
        /// What was being awaited
        what: String,
        /// Time spent waiting
        waited: std::time::Duration,
    },
}

impl JenkinsError {
    /// Returns true for errors that mean the server could not be reached or
    /// refused the credentials
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Unauthorized { .. })
    }
}

/// Result alias for Jenkins API calls
pub type JenkinsResult<T> = Result<T, JenkinsError>;
