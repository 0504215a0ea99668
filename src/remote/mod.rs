//! Remote document store.
//!
//! Named JSON documents kept in a commit-oriented host (a GitHub repository).
//! Every document carries a revision token; writes read the current revision
//! first and send it back, so a concurrent change surfaces as
//! [`WriteOutcome::Conflict`] instead of being overwritten.

mod github;
#[cfg(test)]
pub mod fake_github;
#[cfg(test)]
mod memory;

pub use github::*;
#[cfg(test)]
pub use memory::*;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Document holding the member collection.
pub const MEMBERS_DOCUMENT: &str = "members.json";
/// Document holding the admin credential.
pub const ADMIN_DOCUMENT: &str = "admin.json";

/// A fetched document and its revision token.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub content: serde_json::Value,
    pub revision: String,
}

/// Result of reading a document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentState {
    Fresh(RemoteDocument),
    NotFound,
}

/// Result of writing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed { revision: String, commit: String },
    /// The revision sent with the write was stale.
    Conflict { message: String },
}

/// Classified remote failure.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid document: {0}")]
    Decode(String),

    #[error("Remote error {status}: {message}")]
    Unexpected { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Failure category reported to sync callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    PermissionDenied,
    NotFound,
    Conflict,
    Validation,
    Transport,
    Decode,
    Unexpected,
    Configuration,
}

impl RemoteError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RemoteError::PermissionDenied(_) => FailureKind::PermissionDenied,
            RemoteError::NotFound(_) => FailureKind::NotFound,
            RemoteError::Validation(_) => FailureKind::Validation,
            RemoteError::Transport(_) => FailureKind::Transport,
            RemoteError::Decode(_) => FailureKind::Decode,
            RemoteError::Unexpected { .. } => FailureKind::Unexpected,
            RemoteError::Configuration(_) => FailureKind::Configuration,
        }
    }
}

/// Outcome of the repository existence probe.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    /// The repository is private and no access token is configured.
    pub requires_auth_for_private: bool,
}

impl RepositoryValidation {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Repository metadata returned by the connectivity check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryMetadata {
    pub full_name: String,
    pub default_branch: String,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Outcome of the authenticated connectivity check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connectivity {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RepositoryMetadata>,
}

impl Connectivity {
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            reachable: false,
            reason: Some(reason.into()),
            metadata: None,
        }
    }
}

/// A store of named JSON documents with revision tokens.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document. A missing document is `Ok(NotFound)`; every other
    /// failure is returned as an error and not retried.
    async fn get(&self, filename: &str) -> Result<DocumentState, RemoteError>;

    /// Write a document, supplying the current revision when it exists.
    async fn put(
        &self,
        filename: &str,
        content: &serde_json::Value,
        message: &str,
    ) -> Result<WriteOutcome, RemoteError>;

    /// Check that the repository exists and is readable.
    async fn validate_repository(&self) -> RepositoryValidation;

    /// Check that the repository is reachable with the configured credentials.
    async fn test_connectivity(&self) -> Connectivity;
}
