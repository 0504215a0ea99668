//! Remote sync configuration and status models.

use serde::{Deserialize, Serialize};

fn default_branch() -> String {
    "main".to_string()
}

fn default_path() -> String {
    "data/".to_string()
}

/// Location of the GitHub repository used as the remote document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoCoordinates {
    pub owner: String,
    pub name: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Directory prefix of the data files, with a trailing slash.
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl RepoCoordinates {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            branch: default_branch(),
            path: default_path(),
            token: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Trim fields, drop an empty token, and make sure a non-empty path ends
    /// with a slash.
    pub fn normalized(mut self) -> Self {
        self.owner = self.owner.trim().to_string();
        self.name = self.name.trim().to_string();
        self.branch = match self.branch.trim() {
            "" => default_branch(),
            branch => branch.to_string(),
        };
        let path = self.path.trim().trim_start_matches('/');
        self.path = if path.is_empty() || path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };
        self.token = self
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }

    /// Copy with the access token removed, for status responses and logs.
    pub fn redacted(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }
}

/// Persisted sync state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub cloud_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepoCoordinates>,
}

/// Sync status reported to admins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub cloud_enabled: bool,
    pub connected: bool,
    pub syncing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepoCoordinates>,
    pub has_token: bool,
}
