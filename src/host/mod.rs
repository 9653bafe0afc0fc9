//! Convenience façade over a Jenkins server
//!
//! [`Host`] is the entry point. It hands out small handle objects
//! ([`Job`], [`Queue`], [`Build`], ...) that share the underlying client and
//! fetch fresh state on every accessor call. Errors are the client's own
//! [`JenkinsError`]s, returned unchanged.
//!
//! ```no_run
//! use pumpkins::client::Credentials;
//! use pumpkins::host::Host;
//!
//! # async fn demo() -> pumpkins::client::JenkinsResult<()> {
//! let host = Host::new("http://localhost:8080", Some(Credentials::new("admin", "admin")))?;
//! println!("connected as {}", host.me().await?);
//! # Ok(())
//! # }
//! ```

mod build;
mod configuration;
mod job;
mod parameter;
mod queue;
mod user;
mod xml;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::client::{Credentials, JenkinsApi, JenkinsClient, JenkinsError, JenkinsResult};
use crate::polling::{PollError, RetryPolicy};

pub use build::Build;
pub use configuration::{BuildStep, BuildSteps, Configuration};
pub use job::{Job, Jobs};
pub use parameter::Parameter;
pub use queue::Queue;
pub use user::User;

/// A connection to a Jenkins server
pub struct Host<C: JenkinsApi = JenkinsClient> {
    client: Arc<C>,
    policy: RetryPolicy,
}

impl<C: JenkinsApi> Clone for Host<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            policy: self.policy,
        }
    }
}

impl Host<JenkinsClient> {
    /// Connects to the server at `url`.
    ///
    /// No request is made here: bad credentials or an unreachable server
    /// show up on the first call.
    ///
    /// # Errors
    ///
    /// Returns [`JenkinsError::InvalidUrl`] when `url` is not an http(s) URL.
    pub fn new(url: &str, credentials: Option<Credentials>) -> JenkinsResult<Self> {
        Ok(Self::with_client(JenkinsClient::new(url, credentials)?))
    }

    /// Server base URL, always ending with `/`
    #[must_use]
    pub fn url(&self) -> &str {
        self.client.base_url().as_str()
    }
}

impl<C: JenkinsApi> Host<C> {
    /// Wraps an existing client
    #[must_use]
    pub fn with_client(client: C) -> Self {
        Self {
            client: Arc::new(client),
            policy: RetryPolicy::unbounded(),
        }
    }

    /// Sets how queue items and builds are awaited
    #[must_use]
    pub fn with_wait_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The underlying client
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The authenticated user
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn me(&self) -> JenkinsResult<User> {
        Ok(User::new(self.client.get_whoami().await?))
    }

    /// Whether the server answers and accepts the credentials
    pub async fn is_connected(&self) -> bool {
        match self.client.get_whoami().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Connection check failed");
                false
            }
        }
    }

    /// Server version
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn version(&self) -> JenkinsResult<String> {
        self.client.get_version().await
    }

    /// Snapshot of the jobs on the server
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn jobs(&self) -> JenkinsResult<Jobs<C>> {
        Jobs::fetch(Arc::clone(&self.client), self.policy).await
    }

    /// The job called `name` (`folder/name` for jobs in folders)
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn job(&self, name: &str) -> JenkinsResult<Option<Job<C>>> {
        if !self.client.job_exists(name).await? {
            return Ok(None);
        }
        Job::fetch(name, Arc::clone(&self.client), self.policy)
            .await
            .map(Some)
    }

    /// Creates an empty freestyle job
    ///
    /// # Errors
    ///
    /// [`JenkinsError::AlreadyExists`] when the name is taken, otherwise the
    /// client error.
    pub async fn create_job(&self, name: &str) -> JenkinsResult<Job<C>> {
        job::create(&self.client, self.policy, name).await
    }
}

impl<C: JenkinsApi> fmt::Debug for Host<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Turns a failed wait into the client error it stands for
fn wait_error(err: PollError<JenkinsError>, what: String) -> JenkinsError {
    match err {
        PollError::Probe(e) => e,
        PollError::TimedOut { waited, .. } => JenkinsError::WaitTimeout { what, waited },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::mock::MockJenkins;
    use super::*;
    use crate::client::BuildResult;
    use pretty_assertions::assert_eq;

    fn host(mock: MockJenkins) -> Host<MockJenkins> {
        Host::with_client(mock).with_wait_policy(RetryPolicy::fixed(Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_me_matches_client() {
        let host = host(MockJenkins::new());
        let direct = host.client().get_whoami().await.unwrap();

        let me = host.me().await.unwrap();

        assert_eq!(me.info(), &direct);
        assert_eq!(me.full_name(), "admin");
        assert_eq!(me.name(), "admin");
        assert!(host.is_connected().await);
    }

    #[tokio::test]
    async fn test_unauthorized_is_propagated_unchanged() {
        let host = host(MockJenkins::new().unauthorized());

        let err = host.me().await.unwrap_err();

        assert!(matches!(err, JenkinsError::Unauthorized { status: 401, .. }));
        assert!(!host.is_connected().await);
    }

    #[tokio::test]
    async fn test_job_lookup() {
        let host = host(MockJenkins::new());
        assert!(host.job("missing").await.unwrap().is_none());

        host.create_job("demo").await.unwrap();
        let job = host.job("demo").await.unwrap().unwrap();

        assert_eq!(job.name(), "demo");
        assert_eq!(job.kind(), "hudson.model.FreeStyleProject");
        assert!(matches!(
            host.create_job("demo").await,
            Err(JenkinsError::AlreadyExists(name)) if name == "demo"
        ));
    }

    #[tokio::test]
    async fn test_jobs_snapshot_and_create() {
        let host = host(MockJenkins::new());
        let mut jobs = host.jobs().await.unwrap();
        assert!(jobs.is_empty());

        jobs.create("one").await.unwrap();
        jobs.create("two").await.unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs.to_string(), "2 jobs");
        assert!(jobs.by_name("two").is_some());
        assert!(jobs.contains("one").await.unwrap());
        assert!(!jobs.contains("three").await.unwrap());
        let names: Vec<_> = jobs.iter().map(|job| job.name()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let host = host(MockJenkins::new());
        let job = host.create_job("lifecycle").await.unwrap();

        assert_eq!(job.description().await.unwrap(), "");
        assert!(job.last_build().await.unwrap().is_none());
        assert!(job.wait().await.unwrap().is_none());

        let config = job
            .update_configuration(|config| {
                config.set_description("made by tests")?;
                config.update_build_steps(|steps| steps.add("echo hello"))
            })
            .await
            .unwrap();
        assert_eq!(config.build_steps().unwrap().get(0).as_deref(), Some("echo hello"));
        assert_eq!(job.description().await.unwrap(), "made by tests");

        let queue = job.schedule(&HashMap::new()).await.unwrap();
        let build = queue.wait().await.unwrap();
        assert_eq!(build.number(), 1);
        assert!(build.succeeded().await.unwrap());
        assert_eq!(build.output().await.unwrap(), "+ echo hello\nFinished: SUCCESS\n");
        assert_eq!(job.next_build_number().await.unwrap(), 2);
        assert_eq!(job.last_successful_build().await.unwrap().unwrap().number(), 1);
        assert!(job.last_failed_build().await.unwrap().is_none());

        job.update_configuration(|config| {
            config.update_build_steps(|steps| {
                steps.set(0, "false");
            })
        })
        .await
        .unwrap();
        let build = job.start(&HashMap::new()).await.unwrap();
        assert_eq!(build.result().await.unwrap(), Some(BuildResult::Failure));
        assert!(build.failed().await.unwrap());
        assert_eq!(job.last_failed_build().await.unwrap().unwrap().number(), 2);
        assert_eq!(job.builds().await.unwrap().len(), 2);

        let copy = job.copy("lifecycle-copy").await.unwrap();
        assert_eq!(copy.name(), "lifecycle-copy");
        assert_eq!(copy.description().await.unwrap(), "made by tests");

        job.disable().await.unwrap();
        assert!(!job.buildable().await.unwrap());
        job.enable().await.unwrap();
        assert!(job.buildable().await.unwrap());

        job.delete().await.unwrap();
        assert!(host.job("lifecycle").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_queue_item() {
        let host = host(MockJenkins::new().with_queue_delay(100));
        let job = host.create_job("slow").await.unwrap();

        let queue = job.schedule(&HashMap::new()).await.unwrap();
        queue.cancel().await.unwrap();

        assert!(matches!(queue.wait().await, Err(JenkinsError::Cancelled(n)) if n == queue.number()));
    }

    #[tokio::test]
    async fn test_wait_with_deadline_times_out() {
        let host = Host::with_client(MockJenkins::new().with_queue_delay(u32::MAX))
            .with_wait_policy(
                RetryPolicy::fixed(Duration::from_millis(2))
                    .with_timeout(Duration::from_millis(20)),
            );
        let job = host.create_job("stuck").await.unwrap();

        let err = job.start(&HashMap::new()).await.unwrap_err();

        assert!(matches!(err, JenkinsError::WaitTimeout { .. }));
    }

    #[tokio::test]
    async fn test_parameters_are_passed_through() {
        let host = host(MockJenkins::new());
        let job = host.create_job("params").await.unwrap();
        let params = HashMap::from([("BRANCH".to_string(), "main".to_string())]);

        let build = job.start(&params).await.unwrap();

        let env = build.env().await.unwrap().unwrap();
        assert_eq!(env.get("BRANCH").map(String::as_str), Some("main"));
    }
}
