//! Interactive vs. unattended startup

use std::fmt;

use crate::infrastructure::Config;

/// How the server is brought up, decided once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupMode {
    /// A human finishes setup through the web wizard; the generated admin
    /// password is printed once the server writes it
    Interactive,
    /// Setup wizard disabled; bootstrap artifacts from the mounted volume
    /// are applied and the server log is watched for readiness
    Unattended,
}

impl StartupMode {
    /// Mode selected by `config`
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        if config.interactive {
            Self::Interactive
        } else {
            Self::Unattended
        }
    }

    /// Whether the server should skip its first-run setup wizard
    #[must_use]
    pub fn skips_setup_wizard(self) -> bool {
        self == Self::Unattended
    }
}

impl fmt::Display for StartupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interactive => f.write_str("interactive"),
            Self::Unattended => f.write_str("unattended"),
        }
    }
}
