//! # Pumpkins - Jenkins in a container, and a client to drive it
//!
//! Two independent halves:
//!
//! - [`host`]: a convenience façade over the Jenkins REST API. A [`Host`]
//!   hands out jobs, queue items and builds that fetch fresh state on every
//!   call, on top of the [`client::JenkinsApi`] capability trait.
//! - [`orchestrator`]: the container entrypoint. It launches the server,
//!   applies bootstrap artifacts found on a mounted volume, waits for the
//!   server to be ready and hands over to a command or shell.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::collections::HashMap;
//! use pumpkins::prelude::*;
//!
//! # async fn demo() -> Result<(), JenkinsError> {
//! let host = Host::new("http://localhost:8080", Some(Credentials::new("admin", "admin")))?;
//! let job = host.create_job("hello").await?;
//! job.update_configuration(|config| config.update_build_steps(|steps| steps.add("echo hello")))
//!     .await?;
//!
//! let build = job.start(&HashMap::new()).await?;
//! assert!(build.succeeded().await?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod host;
pub mod infrastructure;
pub mod orchestrator;
pub mod polling;

// Prelude module for common imports
pub mod prelude;

// Re-export commonly used types
pub use client::{Credentials, JenkinsApi, JenkinsClient, JenkinsError, JenkinsResult};
pub use host::{Build, Configuration, Host, Job, Jobs, Queue, User};
pub use infrastructure::{Config, init_logging};
pub use orchestrator::{Orchestrator, OrchestratorError, StartupMode};
pub use polling::{PollError, RetryPolicy};

/// Version of the pumpkins crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
