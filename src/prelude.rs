//! Prelude module for common imports

pub use crate::client::{
    BuildResult, Credentials, JenkinsApi, JenkinsClient, JenkinsError, JenkinsResult,
};
pub use crate::host::{
    Build, BuildSteps, Configuration, Host, Job, Jobs, Parameter, Queue, User,
};
pub use crate::infrastructure::Config;
pub use crate::orchestrator::{
    BootstrapArtifacts, Handoff, MountRoot, Orchestrator, OrchestratorError, OrchestratorResult,
    ServerCommand, StartupMode,
};
pub use crate::polling::{PollError, RetryPolicy, poll_until};
