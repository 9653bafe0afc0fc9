//! Configuration management
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional YAML file, then environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::polling::RetryPolicy;

/// Errors raised while loading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Cannot read config file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid YAML for [`Config`]
    #[error("Invalid config file {path}: {source}")]
    Yaml {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: serde_yaml::Error,
    },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Jenkins home directory
    pub jenkins_home: PathBuf,
    /// Path of `jenkins.war`
    pub war: PathBuf,
    /// Java executable
    pub java: String,
    /// Extra JVM options
    pub java_opts: Vec<String>,
    /// Extra Jenkins options
    pub jenkins_opts: Vec<String>,
    /// Server log file, `<jenkins_home>/jenkins.log` when unset
    pub log_file: Option<PathBuf>,
    /// Log level for this program
    pub log_level: String,
    /// Leave setup to a human instead of bootstrapping
    pub interactive: bool,
    /// Mount table to scan
    pub mount_table: PathBuf,
    /// Mount root used when no mount is discovered
    pub default_mount: PathBuf,
    /// Mount points never considered as the configuration volume
    pub excluded_mounts: Vec<PathBuf>,
    /// Plugin installer executable
    pub plugin_installer: String,
    /// Shell started when no command is given
    pub shell: PathBuf,
    /// Readiness poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Readiness deadline in seconds, `0` to wait forever
    pub ready_timeout_secs: u64,
    /// Server URL for the client commands
    pub url: String,
    /// User name for the client commands
    pub username: Option<String>,
    /// Password or API token for the client commands
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jenkins_home: PathBuf::from("/var/jenkins_home"),
            war: PathBuf::from("/usr/share/jenkins/jenkins.war"),
            java: "java".to_string(),
            java_opts: Vec::new(),
            jenkins_opts: Vec::new(),
            log_file: None,
            log_level: "info".to_string(),
            interactive: false,
            mount_table: PathBuf::from("/proc/self/mounts"),
            default_mount: PathBuf::from("/mnt/pumpkins"),
            excluded_mounts: ["/", "/etc/hosts", "/etc/hostname", "/etc/resolv.conf"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            plugin_installer: "jenkins-plugin-cli".to_string(),
            shell: PathBuf::from("/bin/bash"),
            poll_interval_ms: 1000,
            ready_timeout_secs: 600,
            url: "http://localhost:8080".to_string(),
            username: None,
            password: None,
        }
    }
}

/// Values an environment flag may take to mean "off"
fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(var = key, value = %value, "Ignoring non-numeric override");
            None
        }
    }
}

fn parse_options(key: &str, value: &str) -> Option<Vec<String>> {
    match shell_words::split(value) {
        Ok(words) => Some(words),
        Err(e) => {
            warn!(var = key, error = %e, "Ignoring unparseable options");
            None
        }
    }
}

impl Config {
    /// Defaults overlaid with the YAML file at `path`, if any
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Applies overrides looked up through `lookup`
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("JENKINS_HOME") {
            self.jenkins_home = v.into();
        }
        if let Some(v) = get("JENKINS_WAR") {
            self.war = v.into();
        }
        if let Some(v) = get("JAVA") {
            self.java = v;
        }
        if let Some(opts) = get("JAVA_OPTS").and_then(|v| parse_options("JAVA_OPTS", &v)) {
            self.java_opts = opts;
        }
        if let Some(opts) = get("JENKINS_OPTS").and_then(|v| parse_options("JENKINS_OPTS", &v)) {
            self.jenkins_opts = opts;
        }
        if let Some(v) = get("PUMPKINS_LOG_FILE") {
            self.log_file = Some(v.into());
        }
        if let Some(v) = get("PUMPKINS_LOG_LEVEL") {
            self.log_level = v;
        }
        // Set but empty means "not interactive", so read it unfiltered
        if let Some(v) = lookup("INTERACTIVE") {
            self.interactive = is_truthy(&v);
        }
        if let Some(v) = get("PUMPKINS_MOUNT_TABLE") {
            self.mount_table = v.into();
        }
        if let Some(v) = get("PUMPKINS_DEFAULT_MOUNT") {
            self.default_mount = v.into();
        }
        if let Some(v) = get("PUMPKINS_PLUGIN_INSTALLER") {
            self.plugin_installer = v;
        }
        if let Some(v) = get("SHELL") {
            self.shell = v.into();
        }
        let key = "PUMPKINS_POLL_INTERVAL_MS";
        if let Some(n) = get(key).and_then(|v| parse_number(key, &v)) {
            self.poll_interval_ms = n;
        }
        let key = "PUMPKINS_READY_TIMEOUT_SECS";
        if let Some(n) = get(key).and_then(|v| parse_number(key, &v)) {
            self.ready_timeout_secs = n;
        }
        if let Some(v) = get("JENKINS_URL") {
            self.url = v;
        }
        if let Some(v) = get("JENKINS_USER") {
            self.username = Some(v);
        }
        if let Some(v) = get("JENKINS_PASSWORD") {
            self.password = Some(v);
        }
    }

    /// Where the server writes its output
    #[must_use]
    pub fn log_file_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.jenkins_home.join("jenkins.log"))
    }

    /// File holding the generated admin password
    #[must_use]
    pub fn secret_file(&self) -> PathBuf {
        self.jenkins_home.join("secrets").join("initialAdminPassword")
    }

    /// Directory of Groovy scripts run at server start
    #[must_use]
    pub fn init_dir(&self) -> PathBuf {
        self.jenkins_home.join("init.groovy.d")
    }

    /// Directory plugins are installed into
    #[must_use]
    pub fn plugin_dir(&self) -> PathBuf {
        self.jenkins_home.join("plugins")
    }

    /// Marker written once bootstrap artifacts have been applied
    #[must_use]
    pub fn bootstrap_marker(&self) -> PathBuf {
        self.jenkins_home.join(".pumpkins-bootstrapped")
    }

    /// Policy for readiness polling
    #[must_use]
    pub fn ready_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(Duration::from_millis(self.poll_interval_ms))
            .with_timeout_secs(self.ready_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tracing_subscriber::fmt::MakeWriter;

    /// Log sink shared between a test and its subscriber
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.jenkins_home, PathBuf::from("/var/jenkins_home"));
        assert_eq!(config.log_level, "info");
        assert!(!config.interactive);
        assert_eq!(
            config.log_file_path(),
            PathBuf::from("/var/jenkins_home/jenkins.log")
        );
        assert_eq!(
            config.secret_file(),
            PathBuf::from("/var/jenkins_home/secrets/initialAdminPassword")
        );
        assert_eq!(
            config.ready_policy().timeout,
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pumpkins.yaml");
        std::fs::write(
            &path,
            "jenkins_home: /srv/jenkins\nready_timeout_secs: 0\njava_opts: [-Xmx1g]\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.jenkins_home, PathBuf::from("/srv/jenkins"));
        assert_eq!(config.java_opts, vec!["-Xmx1g"]);
        assert_eq!(config.ready_policy().timeout, None);
        assert_eq!(config.shell, PathBuf::from("/bin/bash"));
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "poll_interval_ms: soon\n").unwrap();
        assert!(matches!(
            Config::load(Some(&bad)),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_with(env(&[
            ("JENKINS_HOME", "/data"),
            ("JAVA_OPTS", "-Xmx2g -Dfoo='a b'"),
            ("INTERACTIVE", "yes"),
            ("PUMPKINS_POLL_INTERVAL_MS", "250"),
            ("PUMPKINS_READY_TIMEOUT_SECS", "later"),
            ("JENKINS_USER", "admin"),
        ]));

        assert_eq!(config.jenkins_home, PathBuf::from("/data"));
        assert_eq!(config.java_opts, vec!["-Xmx2g", "-Dfoo=a b"]);
        assert!(config.interactive);
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.ready_timeout_secs, 600);
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.password, None);
        assert_eq!(config.log_file_path(), PathBuf::from("/data/jenkins.log"));
    }

    #[test]
    fn test_rejected_overrides_are_logged() {
        let logs = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let mut config = Config::default();

        tracing::subscriber::with_default(subscriber, || {
            config.apply_env_with(env(&[
                ("PUMPKINS_READY_TIMEOUT_SECS", "10m"),
                ("PUMPKINS_POLL_INTERVAL_MS", "250"),
                ("JAVA_OPTS", "-Dx='unterminated"),
            ]));
        });

        let out = logs.contents();
        assert!(out.contains("WARN"), "{out}");
        assert!(out.contains("PUMPKINS_READY_TIMEOUT_SECS"), "{out}");
        assert!(out.contains("10m"), "{out}");
        assert!(out.contains("JAVA_OPTS"), "{out}");
        assert!(!out.contains("PUMPKINS_POLL_INTERVAL_MS"), "{out}");
        assert_eq!(config.ready_timeout_secs, 600);
        assert_eq!(config.poll_interval_ms, 250);
        assert!(config.java_opts.is_empty());
    }

    #[test]
    fn test_interactive_flag_values() {
        for (value, expected) in [
            ("1", true),
            ("true", true),
            ("", false),
            ("0", false),
            ("False", false),
            ("no", false),
            ("off", false),
        ] {
            let mut config = Config {
                interactive: !expected,
                ..Config::default()
            };
            config.apply_env_with(env(&[("INTERACTIVE", value)]));
            assert_eq!(config.interactive, expected, "INTERACTIVE={value:?}");
        }
    }
}
