//! The authenticated user

use std::fmt;

use crate::client::UserInfo;

/// A Jenkins user, as seen by the current credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    info: UserInfo,
}

impl User {
    pub(crate) fn new(info: UserInfo) -> Self {
        Self { info }
    }

    /// Full display name
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.info.full_name
    }

    /// Same as [`full_name`](Self::full_name)
    #[must_use]
    pub fn name(&self) -> &str {
        self.full_name()
    }

    /// Login id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// Description, empty when unset
    #[must_use]
    pub fn description(&self) -> &str {
        self.info.description.as_deref().unwrap_or_default()
    }

    /// Link to the user page
    #[must_use]
    pub fn url(&self) -> &str {
        &self.info.absolute_url
    }

    /// The raw API document
    #[must_use]
    pub fn info(&self) -> &UserInfo {
        &self.info
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
