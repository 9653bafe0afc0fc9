//! HTTP implementation of [`JenkinsApi`] on top of reqwest

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::api::JenkinsApi;
use super::errors::{JenkinsError, JenkinsResult};
use super::types::{
    BuildInfo, Credentials, EnvVars, JobInfo, JobSummary, QueueItem, TestReport, UserInfo,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 512;

/// `None` = no crumb required by the server
type Crumb = Option<(String, String)>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrumbResponse {
    crumb: String,
    crumb_request_field: String,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<JobSummary>,
}

/// Jenkins REST client
#[derive(Debug)]
pub struct JenkinsClient {
    http: reqwest::Client,
    base: Url,
    credentials: Option<Credentials>,
    crumb: Mutex<Option<Crumb>>,
}

impl JenkinsClient {
    /// Creates a client for the server at `url`.
    ///
    /// No request is sent until the first API call.
    ///
    /// # Errors
    ///
    /// Returns [`JenkinsError::InvalidUrl`] when `url` is not an absolute
    /// http(s) URL, and [`JenkinsError::Http`] when the HTTP client cannot be
    /// built.
    pub fn new(url: &str, credentials: Option<Credentials>) -> JenkinsResult<Self> {
        let base = normalize_base(url)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            http,
            base,
            credentials,
            crumb: Mutex::new(None),
        })
    }

    /// Server base URL, always ending with `/`
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[String], query: &[(&str, &str)]) -> JenkinsResult<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            path.pop_if_empty();
            path.extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }

    async fn get(&self, url: Url) -> JenkinsResult<Response> {
        debug!(url = %url, "GET");
        let response = self.request(Method::GET, url.clone()).send().await?;
        check_status(response, &url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> JenkinsResult<T> {
        let body = self.get(url).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn crumb(&self) -> JenkinsResult<Crumb> {
        let cached = self.crumb.lock().clone();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let url = self.url(&segments(["crumbIssuer", "api", "json"]), &[])?;
        let crumb = match self.get_json::<CrumbResponse>(url).await {
            Ok(c) => Some((c.crumb_request_field, c.crumb)),
            Err(JenkinsError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        debug!(required = crumb.is_some(), "CSRF crumb resolved");

        *self.crumb.lock() = Some(crumb.clone());
        Ok(crumb)
    }

    async fn post(&self, url: Url, body: PostBody<'_>) -> JenkinsResult<Response> {
        debug!(url = %url, "POST");
        let mut builder = self.request(Method::POST, url.clone());
        if let Some((field, value)) = self.crumb().await? {
            builder = builder.header(field.as_str(), value.as_str());
        }
        builder = match body {
            PostBody::Empty => builder,
            PostBody::Xml(xml) => builder
                .header(CONTENT_TYPE, "text/xml; charset=utf-8")
                .body(xml.to_string()),
            PostBody::Form(params) => builder.form(params),
        };
        let response = builder.send().await?;
        check_status(response, &url).await
    }

    fn job_url(&self, name: &str, rest: &[&str], query: &[(&str, &str)]) -> JenkinsResult<Url> {
        let mut path = job_segments(name);
        path.extend(rest.iter().map(|s| (*s).to_string()));
        self.url(&path, query)
    }

    fn build_url(
        &self,
        name: &str,
        number: u64,
        rest: &[&str],
        query: &[(&str, &str)],
    ) -> JenkinsResult<Url> {
        let number = number.to_string();
        let mut path = vec![number.as_str()];
        path.extend_from_slice(rest);
        self.job_url(name, &path, query)
    }

    /// URL of `createItem` in the folder that will contain `name`
    fn create_item_url(&self, name: &str, query: &[(&str, &str)]) -> JenkinsResult<Url> {
        let mut path = match name.rsplit_once('/') {
            Some((parent, _)) => job_segments(parent),
            None => Vec::new(),
        };
        path.push("createItem".to_string());
        self.url(&path, query)
    }
}

enum PostBody<'a> {
    Empty,
    Xml(&'a str),
    Form(&'a HashMap<String, String>),
}

fn normalize_base(url: &str) -> JenkinsResult<Url> {
    let mut base = Url::parse(url)?;
    if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
        return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

fn segments<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_string()).collect()
}

/// `team/app` becomes `job/team/job/app`
fn job_segments(name: &str) -> Vec<String> {
    name.split('/')
        .filter(|part| !part.is_empty())
        .flat_map(|part| ["job".to_string(), part.to_string()])
        .collect()
}

fn short_name(name: &str) -> &str {
    name.rsplit_once('/').map_or(name, |(_, short)| short)
}

async fn check_status(response: Response, url: &Url) -> JenkinsResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(JenkinsError::Unauthorized {
            status: status.as_u16(),
            url: url.to_string(),
        }),
        StatusCode::NOT_FOUND => Err(JenkinsError::NotFound(url.path().to_string())),
        _ => {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            Err(JenkinsError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            })
        }
    }
}

/// Extracts `42` from `http://host/queue/item/42/`
fn parse_queue_location(location: Option<&str>) -> JenkinsResult<u64> {
    let invalid = || JenkinsError::QueueLocation(location.map(str::to_string));
    let location = location.ok_or_else(invalid)?;
    let trimmed = location.trim_end_matches('/');
    let (prefix, number) = trimmed.rsplit_once('/').ok_or_else(invalid)?;
    if !prefix.ends_with("queue/item") {
        return Err(invalid());
    }
    number.parse().map_err(|_| invalid())
}

#[async_trait]
impl JenkinsApi for JenkinsClient {
    async fn get_whoami(&self) -> JenkinsResult<UserInfo> {
        let url = self.url(&segments(["me", "api", "json"]), &[("depth", "0")])?;
        self.get_json(url).await
    }

    async fn get_version(&self) -> JenkinsResult<String> {
        let url = self.base.clone();
        let response = self.get(url.clone()).await?;
        match response.headers().get("X-Jenkins") {
            Some(value) => Ok(value.to_str().unwrap_or_default().to_string()),
            None => Err(JenkinsError::UnexpectedStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
                body: "missing X-Jenkins header".to_string(),
            }),
        }
    }

    async fn get_jobs(&self) -> JenkinsResult<Vec<JobSummary>> {
        let url = self.url(
            &segments(["api", "json"]),
            &[("tree", "jobs[name,url,color,fullName]")],
        )?;
        let list: JobList = self.get_json(url).await?;
        Ok(list.jobs)
    }

    async fn job_exists(&self, name: &str) -> JenkinsResult<bool> {
        let url = self.job_url(name, &["api", "json"], &[("tree", "name")])?;
        match self.get(url).await {
            Ok(_) => Ok(true),
            Err(JenkinsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_job_info(&self, name: &str) -> JenkinsResult<JobInfo> {
        let url = self.job_url(name, &["api", "json"], &[("depth", "0")])?;
        self.get_json(url).await
    }

    async fn get_job_config(&self, name: &str) -> JenkinsResult<String> {
        let url = self.job_url(name, &["config.xml"], &[])?;
        Ok(self.get(url).await?.text().await?)
    }

    async fn reconfig_job(&self, name: &str, config_xml: &str) -> JenkinsResult<()> {
        let url = self.job_url(name, &["config.xml"], &[])?;
        self.post(url, PostBody::Xml(config_xml)).await?;
        Ok(())
    }

    async fn create_job(&self, name: &str, config_xml: &str) -> JenkinsResult<()> {
        if self.job_exists(name).await? {
            return Err(JenkinsError::AlreadyExists(name.to_string()));
        }
        let url = self.create_item_url(name, &[("name", short_name(name))])?;
        self.post(url, PostBody::Xml(config_xml)).await?;
        Ok(())
    }

    async fn copy_job(&self, from: &str, to: &str) -> JenkinsResult<()> {
        let url = self.create_item_url(
            to,
            &[("name", short_name(to)), ("mode", "copy"), ("from", from)],
        )?;
        self.post(url, PostBody::Empty).await?;
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> JenkinsResult<()> {
        let url = self.job_url(name, &["doDelete"], &[])?;
        self.post(url, PostBody::Empty).await?;
        Ok(())
    }

    async fn enable_job(&self, name: &str) -> JenkinsResult<()> {
        let url = self.job_url(name, &["enable"], &[])?;
        self.post(url, PostBody::Empty).await?;
        Ok(())
    }

    async fn disable_job(&self, name: &str) -> JenkinsResult<()> {
        let url = self.job_url(name, &["disable"], &[])?;
        self.post(url, PostBody::Empty).await?;
        Ok(())
    }

    async fn build_job(
        &self,
        name: &str,
        parameters: &HashMap<String, String>,
    ) -> JenkinsResult<u64> {
        let response = if parameters.is_empty() {
            let url = self.job_url(name, &["build"], &[])?;
            self.post(url, PostBody::Empty).await?
        } else {
            let url = self.job_url(name, &["buildWithParameters"], &[])?;
            self.post(url, PostBody::Form(parameters)).await?
        };

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok());
        parse_queue_location(location)
    }

    async fn get_queue_item(&self, number: u64) -> JenkinsResult<QueueItem> {
        let number = number.to_string();
        let url = self.url(
            &segments(["queue", "item", number.as_str(), "api", "json"]),
            &[("depth", "0")],
        )?;
        self.get_json(url).await
    }

    async fn cancel_queue(&self, id: u64) -> JenkinsResult<()> {
        let id = id.to_string();
        let url = self.url(&segments(["queue", "cancelItem"]), &[("id", id.as_str())])?;
        self.post(url, PostBody::Empty).await?;
        Ok(())
    }

    async fn get_build_info(&self, name: &str, number: u64) -> JenkinsResult<BuildInfo> {
        let url = self.build_url(name, number, &["api", "json"], &[("depth", "0")])?;
        self.get_json(url).await
    }

    async fn get_build_console_output(&self, name: &str, number: u64) -> JenkinsResult<String> {
        let url = self.build_url(name, number, &["consoleText"], &[])?;
        Ok(self.get(url).await?.text().await?)
    }

    async fn stop_build(&self, name: &str, number: u64) -> JenkinsResult<()> {
        let url = self.build_url(name, number, &["stop"], &[])?;
        self.post(url, PostBody::Empty).await?;
        Ok(())
    }

    async fn delete_build(&self, name: &str, number: u64) -> JenkinsResult<()> {
        let url = self.build_url(name, number, &["doDelete"], &[])?;
        self.post(url, PostBody::Empty).await?;
        Ok(())
    }

    async fn get_build_env_vars(
        &self,
        name: &str,
        number: u64,
    ) -> JenkinsResult<Option<HashMap<String, String>>> {
        let url = self.build_url(
            name,
            number,
            &["injectedEnvVars", "api", "json"],
            &[("depth", "0")],
        )?;
        match self.get_json::<EnvVars>(url).await {
            Ok(vars) => Ok(Some(vars.env_map)),
            Err(JenkinsError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_build_test_report(
        &self,
        name: &str,
        number: u64,
    ) -> JenkinsResult<Option<TestReport>> {
        let url = self.build_url(
            name,
            number,
            &["testReport", "api", "json"],
            &[("depth", "0")],
        )?;
        match self.get_json::<TestReport>(url).await {
            Ok(report) => Ok(Some(report)),
            Err(JenkinsError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
