//! In-memory Jenkins used by the façade tests
//!
//! Jobs keep their `config.xml`; scheduling a build puts an item in the
//! queue that turns into a finished build after a configurable number of
//! polls. The build result follows the last shell step: `false` fails,
//! anything else succeeds.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{
    BuildInfo, BuildRef, BuildResult, JenkinsApi, JenkinsError, JenkinsResult,
    JobInfo, JobSummary, QueueItem, QueueTask, TestReport, UserInfo,
};

use super::configuration::Configuration;

const BASE: &str = "http://mock/";
const FREESTYLE: &str = "hudson.model.FreeStyleProject";

#[derive(Debug, Clone)]
struct MockBuild {
    number: u64,
    result: BuildResult,
    output: String,
    env: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct MockJob {
    name: String,
    config: String,
    next_build_number: u64,
    builds: Vec<MockBuild>,
}

#[derive(Debug)]
struct MockQueueItem {
    job: String,
    params: HashMap<String, String>,
    polls_left: u32,
    cancelled: bool,
    build: Option<u64>,
}

#[derive(Debug, Default)]
struct State {
    jobs: Vec<MockJob>,
    queue: HashMap<u64, MockQueueItem>,
    next_queue: u64,
}

#[derive(Debug, Default)]
pub(crate) struct MockJenkins {
    state: Mutex<State>,
    unauthorized: bool,
    queue_delay: u32,
}

fn job_url(name: &str) -> String {
    format!("{BASE}job/{name}/")
}

fn build_ref(job: &str, number: u64) -> BuildRef {
    BuildRef {
        class: Some("hudson.model.FreeStyleBuild".to_string()),
        number,
        url: format!("{}{number}/", job_url(job)),
    }
}

fn not_found(what: impl Into<String>) -> JenkinsError {
    JenkinsError::NotFound(what.into())
}

impl MockJob {
    fn configuration(&self) -> JenkinsResult<Configuration> {
        Configuration::parse(self.config.clone())
    }

    fn build(&self, number: u64) -> JenkinsResult<&MockBuild> {
        self.builds
            .iter()
            .find(|b| b.number == number)
            .ok_or_else(|| not_found(format!("{} #{number}", self.name)))
    }

    fn last_where(&self, keep: impl Fn(&MockBuild) -> bool) -> Option<BuildRef> {
        self.builds
            .iter()
            .rev()
            .find(|b| keep(b))
            .map(|b| build_ref(&self.name, b.number))
    }

    fn run(&mut self, params: &HashMap<String, String>) -> u64 {
        let number = self.next_build_number;
        self.next_build_number += 1;

        let steps = self
            .configuration()
            .and_then(|c| c.build_steps())
            .map(|steps| steps.iter().filter_map(|s| s.script()).collect::<Vec<_>>())
            .unwrap_or_default();
        let result = match steps.last() {
            Some(script) if script.trim() == "false" => BuildResult::Failure,
            _ => BuildResult::Success,
        };

        let mut output: String = steps.iter().map(|s| format!("+ {s}\n")).collect();
        output.push_str(&format!("Finished: {result}\n"));

        let mut env = params.clone();
        env.insert("BUILD_NUMBER".to_string(), number.to_string());
        env.insert("JOB_NAME".to_string(), self.name.clone());

        self.builds.push(MockBuild {
            number,
            result,
            output,
            env,
        });
        number
    }
}

impl State {
    fn job(&self, name: &str) -> JenkinsResult<&MockJob> {
        self.jobs
            .iter()
            .find(|j| j.name == name)
            .ok_or_else(|| not_found(job_url(name)))
    }

    fn job_mut(&mut self, name: &str) -> JenkinsResult<&mut MockJob> {
        self.jobs
            .iter_mut()
            .find(|j| j.name == name)
            .ok_or_else(|| not_found(job_url(name)))
    }

    fn add_job(&mut self, name: &str, config: String) -> JenkinsResult<()> {
        if self.jobs.iter().any(|j| j.name == name) {
            return Err(JenkinsError::AlreadyExists(name.to_string()));
        }
        Configuration::parse(config.clone())?;
        self.jobs.push(MockJob {
            name: name.to_string(),
            config,
            next_build_number: 1,
            builds: Vec::new(),
        });
        Ok(())
    }
}

impl MockJenkins {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Rejects every call with a 401
    pub(crate) fn unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    /// Number of polls a queue item stays queued
    pub(crate) fn with_queue_delay(mut self, polls: u32) -> Self {
        self.queue_delay = polls;
        self
    }

    fn check(&self) -> JenkinsResult<()> {
        if self.unauthorized {
            return Err(JenkinsError::Unauthorized {
                status: 401,
                url: format!("{BASE}me/api/json"),
            });
        }
        Ok(())
    }

    fn set_disabled(&self, name: &str, disabled: bool) -> JenkinsResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        let job = state.job_mut(name)?;
        let mut config = job.configuration()?;
        config.set_disabled(disabled)?;
        job.config = config.to_xml();
        Ok(())
    }
}

#[async_trait]
impl JenkinsApi for MockJenkins {
    async fn get_whoami(&self) -> JenkinsResult<UserInfo> {
        self.check()?;
        Ok(UserInfo {
            full_name: "admin".to_string(),
            id: "admin".to_string(),
            description: None,
            absolute_url: format!("{BASE}user/admin"),
        })
    }

    async fn get_version(&self) -> JenkinsResult<String> {
        self.check()?;
        Ok("2.440.1".to_string())
    }

    async fn get_jobs(&self) -> JenkinsResult<Vec<JobSummary>> {
        self.check()?;
        let state = self.state.lock();
        Ok(state
            .jobs
            .iter()
            .map(|j| JobSummary {
                class: FREESTYLE.to_string(),
                name: j.name.clone(),
                url: job_url(&j.name),
                color: Some("notbuilt".to_string()),
                full_name: None,
            })
            .collect())
    }

    async fn job_exists(&self, name: &str) -> JenkinsResult<bool> {
        self.check()?;
        Ok(self.state.lock().job(name).is_ok())
    }

    async fn get_job_info(&self, name: &str) -> JenkinsResult<JobInfo> {
        self.check()?;
        let state = self.state.lock();
        let job = state.job(name)?;
        let config = job.configuration()?;
        let in_queue = state
            .queue
            .values()
            .any(|q| q.job == name && !q.cancelled && q.build.is_none());
        let first_build = job.builds.first().map(|b| build_ref(name, b.number));

        Ok(JobInfo {
            class: FREESTYLE.to_string(),
            name: job.name.clone(),
            url: job_url(name),
            color: None,
            full_name: Some(job.name.clone()),
            description: Some(config.description()?),
            buildable: !config.disabled()?,
            in_queue,
            keep_dependencies: false,
            next_build_number: job.next_build_number,
            concurrent_build: Some(config.concurrent_build()?),
            builds: job
                .builds
                .iter()
                .rev()
                .map(|b| build_ref(name, b.number))
                .collect(),
            first_build,
            last_build: job.last_where(|_| true),
            last_completed_build: job.last_where(|_| true),
            last_failed_build: job.last_where(|b| b.result == BuildResult::Failure),
            last_stable_build: job.last_where(|b| b.result == BuildResult::Success),
            last_unstable_build: job.last_where(|b| b.result == BuildResult::Unstable),
            last_successful_build: job.last_where(|b| {
                matches!(b.result, BuildResult::Success | BuildResult::Unstable)
            }),
            last_unsuccessful_build: job.last_where(|b| b.result != BuildResult::Success),
            property: Vec::new(),
        })
    }

    async fn get_job_config(&self, name: &str) -> JenkinsResult<String> {
        self.check()?;
        Ok(self.state.lock().job(name)?.config.clone())
    }

    async fn reconfig_job(&self, name: &str, config_xml: &str) -> JenkinsResult<()> {
        self.check()?;
        Configuration::parse(config_xml)?;
        self.state.lock().job_mut(name)?.config = config_xml.to_string();
        Ok(())
    }

    async fn create_job(&self, name: &str, config_xml: &str) -> JenkinsResult<()> {
        self.check()?;
        self.state.lock().add_job(name, config_xml.to_string())
    }

    async fn copy_job(&self, from: &str, to: &str) -> JenkinsResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        let config = state.job(from)?.config.clone();
        state.add_job(to, config)
    }

    async fn delete_job(&self, name: &str) -> JenkinsResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        state.job(name)?;
        state.jobs.retain(|j| j.name != name);
        Ok(())
    }

    async fn enable_job(&self, name: &str) -> JenkinsResult<()> {
        self.set_disabled(name, false)
    }

    async fn disable_job(&self, name: &str) -> JenkinsResult<()> {
        self.set_disabled(name, true)
    }

    async fn build_job(&self, name: &str, parameters: &HashMap<String, String>) -> JenkinsResult<u64> {
        self.check()?;
        let mut state = self.state.lock();
        state.job(name)?;
        state.next_queue += 1;
        let number = state.next_queue;
        state.queue.insert(
            number,
            MockQueueItem {
                job: name.to_string(),
                params: parameters.clone(),
                polls_left: self.queue_delay,
                cancelled: false,
                build: None,
            },
        );
        Ok(number)
    }

    async fn get_queue_item(&self, number: u64) -> JenkinsResult<QueueItem> {
        self.check()?;
        let mut state = self.state.lock();
        let state = &mut *state;
        let item = state
            .queue
            .get_mut(&number)
            .ok_or_else(|| not_found(format!("{BASE}queue/item/{number}/")))?;

        if !item.cancelled && item.build.is_none() {
            if item.polls_left > 0 {
                item.polls_left -= 1;
            } else {
                let job = state
                    .jobs
                    .iter_mut()
                    .find(|j| j.name == item.job)
                    .ok_or_else(|| not_found(job_url(&item.job)))?;
                item.build = Some(job.run(&item.params));
            }
        }

        Ok(QueueItem {
            id: number,
            stuck: false,
            blocked: false,
            buildable: item.build.is_none() && !item.cancelled,
            cancelled: Some(item.cancelled),
            why: item
                .build
                .is_none()
                .then(|| "Waiting for next available executor".to_string()),
            task: QueueTask {
                name: item.job.clone(),
                url: job_url(&item.job),
            },
            executable: item.build.map(|n| build_ref(&item.job, n)),
        })
    }

    async fn cancel_queue(&self, id: u64) -> JenkinsResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        let item = state
            .queue
            .get_mut(&id)
            .ok_or_else(|| not_found(format!("{BASE}queue/item/{id}/")))?;
        if item.build.is_none() {
            item.cancelled = true;
        }
        Ok(())
    }

    async fn get_build_info(&self, name: &str, number: u64) -> JenkinsResult<BuildInfo> {
        self.check()?;
        let state = self.state.lock();
        let build = state.job(name)?.build(number)?;
        Ok(BuildInfo {
            class: "hudson.model.FreeStyleBuild".to_string(),
            number,
            url: build_ref(name, number).url,
            building: false,
            result: Some(build.result),
            description: None,
            duration: 1500,
            estimated_duration: 1500,
            keep_log: false,
            timestamp: 1_700_000_000_000,
            full_display_name: format!("{name} #{number}"),
        })
    }

    async fn get_build_console_output(&self, name: &str, number: u64) -> JenkinsResult<String> {
        self.check()?;
        Ok(self.state.lock().job(name)?.build(number)?.output.clone())
    }

    async fn stop_build(&self, name: &str, number: u64) -> JenkinsResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        let job = state.job_mut(name)?;
        job.build(number)?;
        if let Some(build) = job.builds.iter_mut().find(|b| b.number == number) {
            build.result = BuildResult::Aborted;
        }
        Ok(())
    }

    async fn delete_build(&self, name: &str, number: u64) -> JenkinsResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        let job = state.job_mut(name)?;
        job.build(number)?;
        job.builds.retain(|b| b.number != number);
        Ok(())
    }

    async fn get_build_env_vars(
        &self,
        name: &str,
        number: u64,
    ) -> JenkinsResult<Option<HashMap<String, String>>> {
        self.check()?;
        Ok(Some(self.state.lock().job(name)?.build(number)?.env.clone()))
    }

    async fn get_build_test_report(
        &self,
        name: &str,
        number: u64,
    ) -> JenkinsResult<Option<TestReport>> {
        self.check()?;
        self.state.lock().job(name)?.build(number)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::EMPTY_CONFIG_XML;

    #[test]
    fn test_build_result_follows_last_step() {
        let mut state = State::default();
        state.add_job("demo", EMPTY_CONFIG_XML.to_string()).unwrap();
        assert!(state.add_job("demo", EMPTY_CONFIG_XML.to_string()).is_err());

        let job = state.job_mut("demo").unwrap();
        let mut config = job.configuration().unwrap();
        config.update_build_steps(|steps| steps.add("false")).unwrap();
        job.config = config.to_xml();

        let number = job.run(&HashMap::new());
        assert_eq!(job.build(number).unwrap().result, BuildResult::Failure);
    }
}
