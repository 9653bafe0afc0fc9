//! Jobs and the job list

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::{
    BuildRef, EMPTY_CONFIG_XML, JenkinsApi, JenkinsClient, JenkinsError, JenkinsResult, JobInfo,
    JobSummary,
};
use crate::polling::RetryPolicy;

use super::build::Build;
use super::configuration::Configuration;
use super::parameter::Parameter;
use super::queue::Queue;

/// Snapshot of the jobs defined on the server
pub struct Jobs<C: JenkinsApi = JenkinsClient> {
    jobs: Vec<Job<C>>,
    client: Arc<C>,
    policy: RetryPolicy,
}

impl<C: JenkinsApi> fmt::Debug for Jobs<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.jobs).finish()
    }
}

impl<C: JenkinsApi> Jobs<C> {
    pub(crate) async fn fetch(client: Arc<C>, policy: RetryPolicy) -> JenkinsResult<Self> {
        let jobs = client
            .get_jobs()
            .await?
            .into_iter()
            .map(|summary| Job::new(summary, Arc::clone(&client), policy))
            .collect();
        Ok(Self {
            jobs,
            client,
            policy,
        })
    }

    /// Number of jobs in the snapshot
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True when the server has no jobs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Job at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Job<C>> {
        self.jobs.get(index)
    }

    /// Iterates over the snapshot
    pub fn iter(&self) -> std::slice::Iter<'_, Job<C>> {
        self.jobs.iter()
    }

    /// Job called `name` in the snapshot
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Job<C>> {
        self.jobs.iter().find(|job| job.name() == name)
    }

    /// Asks the server whether `name` exists, regardless of the snapshot
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn contains(&self, name: &str) -> JenkinsResult<bool> {
        self.client.job_exists(name).await
    }

    /// Creates an empty freestyle job and refreshes the snapshot
    ///
    /// # Errors
    ///
    /// [`JenkinsError::AlreadyExists`] when the name is taken, otherwise the
    /// client error.
    pub async fn create(&mut self, name: &str) -> JenkinsResult<Job<C>> {
        let job = create(&self.client, self.policy, name).await?;
        *self = Self::fetch(Arc::clone(&self.client), self.policy).await?;
        Ok(job)
    }
}

impl<'a, C: JenkinsApi> IntoIterator for &'a Jobs<C> {
    type Item = &'a Job<C>;
    type IntoIter = std::slice::Iter<'a, Job<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<C: JenkinsApi> fmt::Display for Jobs<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} jobs", self.jobs.len())
    }
}

pub(crate) async fn create<C: JenkinsApi>(
    client: &Arc<C>,
    policy: RetryPolicy,
    name: &str,
) -> JenkinsResult<Job<C>> {
    client.create_job(name, EMPTY_CONFIG_XML).await?;
    info!(job = %name, "Created job");
    Job::fetch(name, Arc::clone(client), policy).await
}

/// A job on the server
///
/// Summary fields come from the listing the job was obtained from; every
/// other accessor asks the server again.
pub struct Job<C: JenkinsApi = JenkinsClient> {
    summary: JobSummary,
    client: Arc<C>,
    policy: RetryPolicy,
}

impl<C: JenkinsApi> Clone for Job<C> {
    fn clone(&self) -> Self {
        Self {
            summary: self.summary.clone(),
            client: Arc::clone(&self.client),
            policy: self.policy,
        }
    }
}

impl<C: JenkinsApi> fmt::Debug for Job<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl<C: JenkinsApi> Job<C> {
    pub(crate) fn new(summary: JobSummary, client: Arc<C>, policy: RetryPolicy) -> Self {
        Self {
            summary,
            client,
            policy,
        }
    }

    pub(crate) async fn fetch(name: &str, client: Arc<C>, policy: RetryPolicy) -> JenkinsResult<Self> {
        let info = client.get_job_info(name).await?;
        let mut summary = JobSummary::from(&info);
        // Top-level listings omit fullName; keep the name we were asked for
        summary.full_name.get_or_insert_with(|| name.to_string());
        Ok(Self::new(summary, client, policy))
    }

    /// Name used for API calls, including enclosing folders
    fn path(&self) -> &str {
        self.summary
            .full_name
            .as_deref()
            .unwrap_or(&self.summary.name)
    }

    fn build(&self, build: &BuildRef) -> Build<C> {
        Build::from_ref(self.path(), build, Arc::clone(&self.client), self.policy)
    }

    fn build_opt(&self, build: Option<&BuildRef>) -> Option<Build<C>> {
        build.map(|b| self.build(b))
    }

    /// Java class of the job
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.summary.class
    }

    /// Job name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.summary.name
    }

    /// Job URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.summary.url
    }

    /// Status ball color, as of the listing
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.summary.color.as_deref()
    }

    /// Name including enclosing folders
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.path()
    }

    /// Fresh job document
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn info(&self) -> JenkinsResult<JobInfo> {
        self.client.get_job_info(self.path()).await
    }

    /// Description, empty when unset
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn description(&self) -> JenkinsResult<String> {
        Ok(self.info().await?.description.unwrap_or_default())
    }

    /// Whether the job can be built
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn buildable(&self) -> JenkinsResult<bool> {
        Ok(self.info().await?.buildable)
    }

    /// Whether a build is waiting in the queue
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn in_queue(&self) -> JenkinsResult<bool> {
        Ok(self.info().await?.in_queue)
    }

    /// Whether upstream dependencies are kept
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn keep_dependencies(&self) -> JenkinsResult<bool> {
        Ok(self.info().await?.keep_dependencies)
    }

    /// Number the next build will get
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn next_build_number(&self) -> JenkinsResult<u64> {
        Ok(self.info().await?.next_build_number)
    }

    /// Whether concurrent builds are allowed
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn concurrent_build(&self) -> JenkinsResult<bool> {
        Ok(self.info().await?.concurrent_build.unwrap_or(false))
    }

    /// Known builds, newest first
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn builds(&self) -> JenkinsResult<Vec<Build<C>>> {
        let info = self.info().await?;
        Ok(info.builds.iter().map(|b| self.build(b)).collect())
    }

    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn first_build(&self) -> JenkinsResult<Option<Build<C>>> {
        Ok(self.build_opt(self.info().await?.first_build.as_ref()))
    }

    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn last_build(&self) -> JenkinsResult<Option<Build<C>>> {
        Ok(self.build_opt(self.info().await?.last_build.as_ref()))
    }

    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn last_completed_build(&self) -> JenkinsResult<Option<Build<C>>> {
        Ok(self.build_opt(self.info().await?.last_completed_build.as_ref()))
    }

    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn last_failed_build(&self) -> JenkinsResult<Option<Build<C>>> {
        Ok(self.build_opt(self.info().await?.last_failed_build.as_ref()))
    }

    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn last_stable_build(&self) -> JenkinsResult<Option<Build<C>>> {
        Ok(self.build_opt(self.info().await?.last_stable_build.as_ref()))
    }

    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn last_unstable_build(&self) -> JenkinsResult<Option<Build<C>>> {
        Ok(self.build_opt(self.info().await?.last_unstable_build.as_ref()))
    }

    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn last_successful_build(&self) -> JenkinsResult<Option<Build<C>>> {
        Ok(self.build_opt(self.info().await?.last_successful_build.as_ref()))
    }

    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn last_unsuccessful_build(&self) -> JenkinsResult<Option<Build<C>>> {
        Ok(self.build_opt(self.info().await?.last_unsuccessful_build.as_ref()))
    }

    /// Declared build parameters
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn parameters(&self) -> JenkinsResult<Vec<Parameter>> {
        let info = self.info().await?;
        Ok(info
            .property
            .iter()
            .filter_map(|p| p.parameter_definitions.as_ref())
            .flatten()
            .map(Parameter::new)
            .collect())
    }

    /// Current `config.xml`
    ///
    /// # Errors
    ///
    /// Propagates the client error, or [`JenkinsError::InvalidConfig`] when
    /// the document is not a freestyle project.
    pub async fn configuration(&self) -> JenkinsResult<Configuration> {
        Configuration::parse(self.client.get_job_config(self.path()).await?)
    }

    /// Replaces the job configuration with `config`
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn apply(&self, config: &Configuration) -> JenkinsResult<()> {
        debug!(job = %self.path(), "Applying configuration");
        self.client.reconfig_job(self.path(), &config.to_xml()).await
    }

    /// Fetches the configuration, lets `edit` change it, and applies it
    ///
    /// # Errors
    ///
    /// Returns the first error from fetching, editing or applying.
    pub async fn update_configuration<F>(&self, edit: F) -> JenkinsResult<Configuration>
    where
        F: FnOnce(&mut Configuration) -> JenkinsResult<()>,
    {
        let mut config = self.configuration().await?;
        edit(&mut config)?;
        self.apply(&config).await?;
        Ok(config)
    }

    /// Copies this job to `name` and returns the copy
    ///
    /// # Errors
    ///
    /// [`JenkinsError::AlreadyExists`] when `name` is taken, otherwise the
    /// client error.
    pub async fn copy(&self, name: &str) -> JenkinsResult<Self> {
        if self.client.job_exists(name).await? {
            return Err(JenkinsError::AlreadyExists(name.to_string()));
        }
        self.client.copy_job(self.path(), name).await?;
        info!(from = %self.path(), to = %name, "Copied job");
        Self::fetch(name, Arc::clone(&self.client), self.policy).await
    }

    /// Schedules a build with `params` (none for a plain build)
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn schedule(&self, params: &HashMap<String, String>) -> JenkinsResult<Queue<C>> {
        let number = self.client.build_job(self.path(), params).await?;
        info!(job = %self.path(), queue = number, "Scheduled build");
        Ok(Queue::new(
            self.path(),
            number,
            Arc::clone(&self.client),
            self.policy,
        ))
    }

    /// Schedules a build and waits for it to leave the queue
    ///
    /// # Errors
    ///
    /// See [`schedule`](Self::schedule) and [`Queue::wait`].
    pub async fn start(&self, params: &HashMap<String, String>) -> JenkinsResult<Build<C>> {
        self.schedule(params).await?.wait().await
    }

    /// Waits for the last build to complete; `None` when there is no build
    ///
    /// # Errors
    ///
    /// See [`Build::wait`].
    pub async fn wait(&self) -> JenkinsResult<Option<Build<C>>> {
        let Some(build) = self.last_build().await? else {
            return Ok(None);
        };
        build.wait().await?;
        Ok(Some(build))
    }

    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn enable(&self) -> JenkinsResult<()> {
        self.client.enable_job(self.path()).await
    }

    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn disable(&self) -> JenkinsResult<()> {
        self.client.disable_job(self.path()).await
    }

    /// Deletes the job
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn delete(self) -> JenkinsResult<()> {
        self.client.delete_job(self.path()).await?;
        info!(job = %self.path(), "Deleted job");
        Ok(())
    }
}

impl<C: JenkinsApi> fmt::Display for Job<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
