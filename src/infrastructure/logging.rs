//! Logging configuration
//!
//! Initializes tracing for the application. Output goes to stderr; stdout
//! is reserved for what the user asked to see.

/// Initializes logging with the specified level.
///
/// `RUST_LOG` takes precedence over `level`. Calling this more than once
/// leaves the first subscriber in place.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging("debug");
        init_logging("info");
    }
}
