//! Builds of a job
//!
//! A build can be ongoing (`building() == true`) or completed. Some
//! information (duration, result) is only meaningful once the build is
//! complete, so those accessors wait for completion first.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::client::{
    BuildInfo, BuildRef, BuildResult, JenkinsApi, JenkinsClient, JenkinsResult, TestReport,
};
use crate::polling::{RetryPolicy, poll_until};

use super::wait_error;

/// A build of a job
pub struct Build<C: JenkinsApi = JenkinsClient> {
    job: String,
    number: u64,
    url: String,
    kind: String,
    client: Arc<C>,
    policy: RetryPolicy,
}

impl<C: JenkinsApi> Clone for Build<C> {
    fn clone(&self) -> Self {
        Self {
            job: self.job.clone(),
            number: self.number,
            url: self.url.clone(),
            kind: self.kind.clone(),
            client: Arc::clone(&self.client),
            policy: self.policy,
        }
    }
}

impl<C: JenkinsApi> fmt::Debug for Build<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Build")
            .field("job", &self.job)
            .field("number", &self.number)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl<C: JenkinsApi> Build<C> {
    pub(crate) fn from_ref(job: &str, build: &BuildRef, client: Arc<C>, policy: RetryPolicy) -> Self {
        Self {
            job: job.to_string(),
            number: build.number,
            url: build.url.clone(),
            kind: build.class.clone().unwrap_or_default(),
            client,
            policy,
        }
    }

    /// Build number
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Build URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Java class of the build (empty when the server did not report it)
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Name of the owning job
    #[must_use]
    pub fn job_name(&self) -> &str {
        &self.job
    }

    /// Fresh build document
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn info(&self) -> JenkinsResult<BuildInfo> {
        self.client.get_build_info(&self.job, self.number).await
    }

    /// Console output
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn output(&self) -> JenkinsResult<String> {
        self.client
            .get_build_console_output(&self.job, self.number)
            .await
    }

    /// Aborts the build
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn stop(&self) -> JenkinsResult<()> {
        self.client.stop_build(&self.job, self.number).await
    }

    /// Deletes the build
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn delete(&self) -> JenkinsResult<()> {
        self.client.delete_build(&self.job, self.number).await
    }

    /// Environment variables of the build, `None` when not exposed
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn env(&self) -> JenkinsResult<Option<HashMap<String, String>>> {
        self.client.get_build_env_vars(&self.job, self.number).await
    }

    /// Test report, `None` when there is none
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn test_report(&self) -> JenkinsResult<Option<TestReport>> {
        self.client
            .get_build_test_report(&self.job, self.number)
            .await
    }

    /// Whether the build is still running
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn building(&self) -> JenkinsResult<bool> {
        Ok(self.info().await?.building)
    }

    /// Waits for the build to complete and returns the final document
    ///
    /// # Errors
    ///
    /// Propagates the client error, or [`JenkinsError::WaitTimeout`](crate::client::JenkinsError::WaitTimeout)
    /// when the wait policy has a deadline that passes.
    pub async fn wait(&self) -> JenkinsResult<BuildInfo> {
        debug!(job = %self.job, number = self.number, "Waiting for build to complete");
        poll_until(&self.policy, || async move {
            let info = self.info().await?;
            Ok((!info.building).then_some(info))
        })
        .await
        .map_err(|e| wait_error(e, format!("{self} to complete")))
    }

    /// Final result, waiting for completion if necessary
    ///
    /// # Errors
    ///
    /// See [`wait`](Self::wait).
    pub async fn result(&self) -> JenkinsResult<Option<BuildResult>> {
        Ok(self.wait().await?.result)
    }

    /// Whether the build succeeded, waiting for completion if necessary
    ///
    /// # Errors
    ///
    /// See [`wait`](Self::wait).
    pub async fn succeeded(&self) -> JenkinsResult<bool> {
        Ok(self.result().await? == Some(BuildResult::Success))
    }

    /// Whether the build did not succeed, waiting for completion if necessary
    ///
    /// # Errors
    ///
    /// See [`wait`](Self::wait).
    pub async fn failed(&self) -> JenkinsResult<bool> {
        Ok(!self.succeeded().await?)
    }

    /// Description, empty when unset
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn description(&self) -> JenkinsResult<String> {
        Ok(self.info().await?.description.unwrap_or_default())
    }

    /// How long the build took, waiting for completion if necessary
    ///
    /// # Errors
    ///
    /// See [`wait`](Self::wait).
    pub async fn duration(&self) -> JenkinsResult<Duration> {
        Ok(Duration::from_millis(self.wait().await?.duration))
    }

    /// Server estimate of the duration, `None` when it has no estimate
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn estimated_duration(&self) -> JenkinsResult<Option<Duration>> {
        let estimate = self.info().await?.estimated_duration;
        Ok(u64::try_from(estimate).ok().map(Duration::from_millis))
    }

    /// Whether the log is kept forever
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn keep_log(&self) -> JenkinsResult<bool> {
        Ok(self.info().await?.keep_log)
    }

    /// Start time
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn time(&self) -> JenkinsResult<DateTime<Utc>> {
        let millis = self.info().await?.timestamp;
        Ok(DateTime::from_timestamp_millis(millis).unwrap_or_default())
    }

    /// `<job> #<number>` as displayed by the server
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn display_name(&self) -> JenkinsResult<String> {
        Ok(self.info().await?.full_display_name)
    }
}

impl<C: JenkinsApi> fmt::Display for Build<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.job, self.number)
    }
}
