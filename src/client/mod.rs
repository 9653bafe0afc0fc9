//! Jenkins REST client
//!
//! [`JenkinsApi`] is the capability set the rest of the crate depends on;
//! [`JenkinsClient`] implements it over HTTP.

mod api;
mod errors;
mod http;
mod types;

pub use api::{EMPTY_CONFIG_XML, JenkinsApi};
pub use errors::{JenkinsError, JenkinsResult};
pub use http::JenkinsClient;
pub use types::{
    BuildInfo, BuildRef, BuildResult, Credentials, EnvVars, JobInfo, JobProperty, JobSummary,
    ParameterDefinition, ParameterValue, QueueItem, QueueTask, TestReport, UserInfo,
};
