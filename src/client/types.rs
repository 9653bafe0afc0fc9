//! Jenkins JSON API models
//!
//! Field names follow the remote API (`camelCase`, `_class`). Every field
//! that Jenkins may omit is optional or defaulted, since the shape of these
//! documents varies with installed plugins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Username and password (or API token) for HTTP basic auth
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name
    pub username: String,
    /// Password or API token
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// The authenticated user, as returned by `me/api/json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Display name
    pub full_name: String,
    /// Login id
    pub id: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Link to the user page
    #[serde(default)]
    pub absolute_url: String,
}

/// Entry of the top-level job list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    /// Java class of the job (`hudson.model.FreeStyleProject`, ...)
    #[serde(rename = "_class", default)]
    pub class: String,
    /// Job name
    pub name: String,
    /// Job URL
    pub url: String,
    /// Status ball color (`blue`, `red`, `notbuilt`, ...)
    #[serde(default)]
    pub color: Option<String>,
    /// Name including enclosing folders
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Reference to a build inside a job document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRef {
    /// Java class of the build
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
    /// Build number
    pub number: u64,
    /// Build URL
    #[serde(default)]
    pub url: String,
}

/// Default value of a build parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    /// Parameter name
    #[serde(default)]
    pub name: Option<String>,
    /// Value, typed as Jenkins reports it
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Declaration of a build parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    /// Parameter name
    pub name: String,
    /// Definition type, e.g. `StringParameterDefinition`
    #[serde(rename = "type")]
    pub kind: String,
    /// Help text
    #[serde(default)]
    pub description: Option<String>,
    /// Default value, when one is declared
    #[serde(default)]
    pub default_parameter_value: Option<ParameterValue>,
}

/// Job property; only parameter definitions are of interest
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProperty {
    /// Parameter definitions, present on `ParametersDefinitionProperty`
    #[serde(default)]
    pub parameter_definitions: Option<Vec<ParameterDefinition>>,
}

/// Detailed job document from `job/<name>/api/json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    /// Java class of the job
    #[serde(rename = "_class", default)]
    pub class: String,
    /// Job name
    pub name: String,
    /// Job URL
    #[serde(default)]
    pub url: String,
    /// Status ball color
    #[serde(default)]
    pub color: Option<String>,
    /// Name including enclosing folders
    #[serde(default)]
    pub full_name: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the job can be built
    #[serde(default)]
    pub buildable: bool,
    /// Whether a build is waiting in the queue
    #[serde(default)]
    pub in_queue: bool,
    /// Whether dependencies are kept
    #[serde(default)]
    pub keep_dependencies: bool,
    /// Number the next build will get
    #[serde(default)]
    pub next_build_number: u64,
    /// Whether concurrent builds are allowed
    #[serde(default)]
    pub concurrent_build: Option<bool>,
    /// Known builds, newest first
    #[serde(default)]
    pub builds: Vec<BuildRef>,
    /// First build
    #[serde(default)]
    pub first_build: Option<BuildRef>,
    /// Last build
    #[serde(default)]
    pub last_build: Option<BuildRef>,
    /// Last completed build
    #[serde(default)]
    pub last_completed_build: Option<BuildRef>,
    /// Last failed build
    #[serde(default)]
    pub last_failed_build: Option<BuildRef>,
    /// Last stable build
    #[serde(default)]
    pub last_stable_build: Option<BuildRef>,
    /// Last unstable build
    #[serde(default)]
    pub last_unstable_build: Option<BuildRef>,
    /// Last successful build
    #[serde(default)]
    pub last_successful_build: Option<BuildRef>,
    /// Last unsuccessful build
    #[serde(default)]
    pub last_unsuccessful_build: Option<BuildRef>,
    /// Job properties
    #[serde(default)]
    pub property: Vec<JobProperty>,
}

/// Final state of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    /// Completed successfully
    Success,
    /// Completed with test failures
    Unstable,
    /// Failed
    Failure,
    /// Not built (e.g. skipped)
    NotBuilt,
    /// Aborted by a user or a timeout
    Aborted,
    /// Result reported by a plugin we do not know
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for BuildResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "SUCCESS",
            Self::Unstable => "UNSTABLE",
            Self::Failure => "FAILURE",
            Self::NotBuilt => "NOT_BUILT",
            Self::Aborted => "ABORTED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Build document from `job/<name>/<number>/api/json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Java class of the build
    #[serde(rename = "_class", default)]
    pub class: String,
    /// Build number
    pub number: u64,
    /// Build URL
    #[serde(default)]
    pub url: String,
    /// Still running
    #[serde(default)]
    pub building: bool,
    /// Final result, `None` while running
    #[serde(default)]
    pub result: Option<BuildResult>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Duration in milliseconds (0 while running)
    #[serde(default)]
    pub duration: u64,
    /// Estimated duration in milliseconds (-1 when unknown)
    #[serde(default)]
    pub estimated_duration: i64,
    /// Whether the log is kept forever
    #[serde(default)]
    pub keep_log: bool,
    /// Start time, milliseconds since the epoch
    #[serde(default)]
    pub timestamp: i64,
    /// `<job> #<number>`
    #[serde(default)]
    pub full_display_name: String,
}

/// The task a queue item belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTask {
    /// Task (job) name
    pub name: String,
    /// Task URL
    #[serde(default)]
    pub url: String,
}

/// Queue item document from `queue/item/<n>/api/json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Queue id
    pub id: u64,
    /// Stuck waiting for an executor
    #[serde(default)]
    pub stuck: bool,
    /// Blocked by another build
    #[serde(default)]
    pub blocked: bool,
    /// Ready to be assigned
    #[serde(default)]
    pub buildable: bool,
    /// Cancelled before starting
    #[serde(default)]
    pub cancelled: Option<bool>,
    /// Human-readable reason for waiting
    #[serde(default)]
    pub why: Option<String>,
    /// Owning task
    pub task: QueueTask,
    /// The started build, once there is one
    #[serde(default)]
    pub executable: Option<BuildRef>,
}

/// Test report attached to a build
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    /// Failed tests
    #[serde(default)]
    pub fail_count: u64,
    /// Passed tests
    #[serde(default)]
    pub pass_count: u64,
    /// Skipped tests
    #[serde(default)]
    pub skip_count: u64,
    /// Total duration in seconds
    #[serde(default)]
    pub duration: f64,
    /// Raw suites
    #[serde(default)]
    pub suites: Vec<serde_json::Value>,
}

impl From<&JobInfo> for JobSummary {
    fn from(info: &JobInfo) -> Self {
        Self {
            class: info.class.clone(),
            name: info.name.clone(),
            url: info.url.clone(),
            color: info.color.clone(),
            full_name: info.full_name.clone(),
        }
    }
}

impl TestReport {
    /// Number of tests in the report
    #[must_use]
    pub fn total(&self) -> u64 {
        self.fail_count + self.pass_count + self.skip_count
    }
}

/// Environment of a build as exposed by the EnvInject plugin
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVars {
    /// Variables
    #[serde(default)]
    pub env_map: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_user_info_from_api() {
        let user: UserInfo = serde_json::from_str(
            r#"{"_class":"hudson.model.User","absoluteUrl":"http://localhost:8080/user/admin",
                "description":null,"fullName":"admin","id":"admin","property":[]}"#,
        )
        .unwrap();

        assert_eq!(user.full_name, "admin");
        assert_eq!(user.id, "admin");
        assert_eq!(user.description, None);
        assert_eq!(user.absolute_url, "http://localhost:8080/user/admin");
    }

    #[test]
    fn test_build_info_running_and_finished() {
        let running: BuildInfo = serde_json::from_str(
            r#"{"_class":"hudson.model.FreeStyleBuild","number":3,"url":"u",
                "building":true,"result":null,"duration":0,"estimatedDuration":-1,
                "keepLog":false,"timestamp":1700000000000,"fullDisplayName":"demo #3"}"#,
        )
        .unwrap();
        assert!(running.building);
        assert_eq!(running.result, None);
        assert_eq!(running.estimated_duration, -1);

        let done: BuildInfo =
            serde_json::from_str(r#"{"number":3,"building":false,"result":"ABORTED"}"#).unwrap();
        assert_eq!(done.result, Some(BuildResult::Aborted));
    }

    #[test]
    fn test_unknown_build_result() {
        let info: BuildInfo =
            serde_json::from_str(r#"{"number":1,"result":"SOMETHING_NEW"}"#).unwrap();
        assert_eq!(info.result, Some(BuildResult::Unknown));
    }

    #[test]
    fn test_job_info_with_parameters() {
        let info: JobInfo = serde_json::from_str(
            r#"{"_class":"hudson.model.FreeStyleProject","name":"demo","buildable":true,
                "nextBuildNumber":4,"builds":[{"number":3,"url":"b3"},{"number":2,"url":"b2"}],
                "lastBuild":{"number":3,"url":"b3"},"lastFailedBuild":null,
                "property":[{"_class":"hudson.model.ParametersDefinitionProperty",
                  "parameterDefinitions":[{"name":"BRANCH","type":"StringParameterDefinition",
                    "description":"branch to build",
                    "defaultParameterValue":{"name":"BRANCH","value":"main"}}]}]}"#,
        )
        .unwrap();

        assert_eq!(info.next_build_number, 4);
        assert_eq!(info.builds.len(), 2);
        assert_eq!(info.last_build.as_ref().map(|b| b.number), Some(3));
        assert_eq!(info.last_failed_build, None);

        let defs = info.property[0].parameter_definitions.as_ref().unwrap();
        assert_eq!(defs[0].kind, "StringParameterDefinition");
        assert_eq!(
            defs[0].default_parameter_value.as_ref().unwrap().value,
            serde_json::json!("main")
        );
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("admin", "s3cret");
        let printed = format!("{creds:?}");
        assert!(printed.contains("admin"));
        assert!(!printed.contains("s3cret"));
    }
}
