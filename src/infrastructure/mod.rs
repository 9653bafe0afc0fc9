//! Infrastructure layer
//!
//! Configuration loading and logging setup.

mod config;
mod logging;

pub use config::{Config, ConfigError};
pub use logging::init_logging;
