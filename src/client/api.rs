//! The capability set of a Jenkins client
//!
//! The host façade only ever talks to this trait, so it can run against the
//! HTTP client or against an in-memory double in tests.

use std::collections::HashMap;

use async_trait::async_trait;

use super::errors::JenkinsResult;
use super::types::{BuildInfo, JobInfo, JobSummary, QueueItem, TestReport, UserInfo};

/// Configuration document of an empty freestyle project
pub const EMPTY_CONFIG_XML: &str = r"<?xml version='1.1' encoding='UTF-8'?>
<project>
  <keepDependencies>false</keepDependencies>
  <properties/>
  <scm class='jenkins.scm.NullSCM'/>
  <canRoam>true</canRoam>
  <disabled>false</disabled>
  <blockBuildWhenUpstreamBuilding>false</blockBuildWhenUpstreamBuilding>
  <triggers class='vector'/>
  <concurrentBuild>false</concurrentBuild>
  <builders/>
  <publishers/>
  <buildWrappers/>
</project>";

/// Remote operations offered by a Jenkins server
#[allow(clippy::missing_errors_doc)]
#[async_trait]
pub trait JenkinsApi: Send + Sync {
    /// The authenticated user
    async fn get_whoami(&self) -> JenkinsResult<UserInfo>;

    /// Server version from the `X-Jenkins` header
    async fn get_version(&self) -> JenkinsResult<String>;

    /// Top-level jobs
    async fn get_jobs(&self) -> JenkinsResult<Vec<JobSummary>>;

    /// Whether a job with this name exists
    async fn job_exists(&self, name: &str) -> JenkinsResult<bool>;

    /// Detailed job document
    async fn get_job_info(&self, name: &str) -> JenkinsResult<JobInfo>;

    /// Raw `config.xml` of a job
    async fn get_job_config(&self, name: &str) -> JenkinsResult<String>;

    /// Replaces the `config.xml` of a job
    async fn reconfig_job(&self, name: &str, config_xml: &str) -> JenkinsResult<()>;

    /// Creates a job from a configuration document
    async fn create_job(&self, name: &str, config_xml: &str) -> JenkinsResult<()>;

    /// Creates `to` as a copy of `from`
    async fn copy_job(&self, from: &str, to: &str) -> JenkinsResult<()>;

    /// Deletes a job
    async fn delete_job(&self, name: &str) -> JenkinsResult<()>;

    /// Enables a job
    async fn enable_job(&self, name: &str) -> JenkinsResult<()>;

    /// Disables a job
    async fn disable_job(&self, name: &str) -> JenkinsResult<()>;

    /// Schedules a build and returns its queue item number
    async fn build_job(&self, name: &str, parameters: &HashMap<String, String>)
    -> JenkinsResult<u64>;

    /// Queue item document
    async fn get_queue_item(&self, number: u64) -> JenkinsResult<QueueItem>;

    /// Cancels a queued (not yet started) item
    async fn cancel_queue(&self, id: u64) -> JenkinsResult<()>;

    /// Build document
    async fn get_build_info(&self, name: &str, number: u64) -> JenkinsResult<BuildInfo>;

    /// Plain-text console log
    async fn get_build_console_output(&self, name: &str, number: u64) -> JenkinsResult<String>;

    /// Aborts a running build
    async fn stop_build(&self, name: &str, number: u64) -> JenkinsResult<()>;

    /// Deletes a build
    async fn delete_build(&self, name: &str, number: u64) -> JenkinsResult<()>;

    /// Build environment, `None` when the server does not expose it
    async fn get_build_env_vars(
        &self,
        name: &str,
        number: u64,
    ) -> JenkinsResult<Option<HashMap<String, String>>>;

    /// Test report, `None` when the build has none
    async fn get_build_test_report(
        &self,
        name: &str,
        number: u64,
    ) -> JenkinsResult<Option<TestReport>>;
}
