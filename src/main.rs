//! pumpkins - Jenkins in a container, and a client to drive it
//!
//! ## Commands
//!
//! - `pumpkins start` - Start Jenkins, wait for it, then run a command or shell
//! - `pumpkins whoami` - Show the authenticated user
//! - `pumpkins jobs` - List jobs
//! - `pumpkins build` - Schedule a build and wait for its result
//! - `pumpkins discover-mount` - Show where bootstrap artifacts are read from
//! - `pumpkins completions` - Generate shell completions
//!
//! ## Quick Start
//!
//! ```bash
//! # Container entrypoint: unattended setup, then a shell
//! pumpkins start
//!
//! # Same, but run the test suite instead of a shell
//! pumpkins start -- pytest tests/
//!
//! # Talk to the running server
//! pumpkins whoami --user admin --password admin
//! pumpkins build demo -p BRANCH=main
//! ```

use std::process::ExitCode;

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if std::env::var("PUMPKINS_VERBOSE").is_ok() {
                eprintln!("{e:?}");
            }
            ExitCode::FAILURE
        }
    }
}
