//! Discovery of the configuration volume
//!
//! The volume a user mounts into the container shows up in the live mount
//! table next to a crowd of pseudo filesystems and the files Docker
//! bind-mounts itself (`/etc/hosts`, ...). Whatever survives the filter is
//! taken as the configuration root.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::infrastructure::Config;

use super::errors::{OrchestratorError, OrchestratorResult};

/// Filesystem types that never hold user data
pub const PSEUDO_FILESYSTEMS: &[&str] = &[
    "autofs",
    "binfmt_misc",
    "bpf",
    "cgroup",
    "cgroup2",
    "configfs",
    "debugfs",
    "devpts",
    "devtmpfs",
    "efivarfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "nsfs",
    "overlay",
    "proc",
    "pstore",
    "ramfs",
    "rpc_pipefs",
    "securityfs",
    "selinuxfs",
    "shm",
    "sysfs",
    "tmpfs",
    "tracefs",
];

/// Kernel trees excluded along with everything below them
const SYSTEM_TREES: &[&str] = &["/proc", "/sys", "/dev"];

/// One line of a mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Device or source (`/dev/sda1`, `tmpfs`, ...)
    pub source: String,
    /// Mount point
    pub target: PathBuf,
    /// Filesystem type
    pub fs_type: String,
}

/// Decodes the `\ooo` escapes the kernel uses for blanks in mount fields
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let octal = bytes.get(i + 1..i + 4).filter(|d| {
            bytes[i] == b'\\' && d.iter().all(|b| (b'0'..=b'7').contains(b))
        });
        match octal.and_then(|d| u8::from_str_radix(std::str::from_utf8(d).ok()?, 8).ok()) {
            Some(byte) => {
                out.push(byte);
                i += 4;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parses a table in `/proc/mounts` format, skipping malformed lines
#[must_use]
pub fn parse_mount_table(text: &str) -> Vec<MountEntry> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let target = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                source: unescape(source),
                target: PathBuf::from(unescape(target)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Decides which mount entries may be the configuration volume
#[derive(Debug, Clone, Default)]
pub struct MountFilter {
    excluded: Vec<PathBuf>,
    excluded_trees: Vec<PathBuf>,
}

impl MountFilter {
    /// Filter rejecting pseudo filesystems, the kernel trees, and the given
    /// mount points
    #[must_use]
    pub fn new(excluded: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            excluded: excluded.into_iter().collect(),
            excluded_trees: SYSTEM_TREES.iter().map(PathBuf::from).collect(),
        }
    }

    /// Filter for `config`; the Jenkins home volume is excluded too
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.excluded_mounts.iter().cloned()).exclude_tree(&config.jenkins_home)
    }

    /// Also rejects `path` and everything mounted below it
    #[must_use]
    pub fn exclude_tree(mut self, path: &Path) -> Self {
        self.excluded_trees.push(path.to_path_buf());
        self
    }

    /// Whether `entry` may be the configuration volume
    #[must_use]
    pub fn accepts(&self, entry: &MountEntry) -> bool {
        !PSEUDO_FILESYSTEMS.contains(&entry.fs_type.as_str())
            && !self.excluded.iter().any(|p| *p == entry.target)
            && !self
                .excluded_trees
                .iter()
                .any(|tree| entry.target.starts_with(tree))
    }
}

/// How a mount root was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountSource {
    /// Found in the mount table
    Discovered,
    /// Nothing qualified; the configured default was used
    Fallback,
}

/// Directory expected to hold the bootstrap artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRoot {
    /// Directory path
    pub path: PathBuf,
    /// Whether it was discovered or defaulted
    pub source: MountSource,
}

impl fmt::Display for MountRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            MountSource::Discovered => write!(f, "{}", self.path.display()),
            MountSource::Fallback => write!(f, "{} (default)", self.path.display()),
        }
    }
}

/// First entry accepted by `filter`, or `default`
#[must_use]
pub fn discover_mount_root(entries: &[MountEntry], filter: &MountFilter, default: &Path) -> MountRoot {
    match entries.iter().find(|e| filter.accepts(e)) {
        Some(entry) => {
            info!(path = %entry.target.display(), fs_type = %entry.fs_type, "Discovered mount root");
            MountRoot {
                path: entry.target.clone(),
                source: MountSource::Discovered,
            }
        }
        None => {
            info!(path = %default.display(), "No candidate mount, using default");
            MountRoot {
                path: default.to_path_buf(),
                source: MountSource::Fallback,
            }
        }
    }
}

/// Reads the mount table at `table` and discovers the mount root
///
/// # Errors
///
/// Returns [`OrchestratorError::MountTable`] when the table cannot be read.
pub fn discover_from_table(table: &Path, filter: &MountFilter, default: &Path) -> OrchestratorResult<MountRoot> {
    debug!(table = %table.display(), "Scanning mount table");
    let text = std::fs::read_to_string(table).map_err(|source| OrchestratorError::MountTable {
        path: table.to_path_buf(),
        source,
    })?;
    Ok(discover_mount_root(&parse_mount_table(&text), filter, default))
}
