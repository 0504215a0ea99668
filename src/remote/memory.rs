//! In-memory document store for sync tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    Connectivity, DocumentState, DocumentStore, RemoteDocument, RemoteError,
    RepositoryMetadata, RepositoryValidation, WriteOutcome,
};

#[derive(Default)]
struct Inner {
    documents: HashMap<String, RemoteDocument>,
    next_revision: u64,
    read_failures: HashMap<String, RemoteError>,
    write_failures: HashMap<String, RemoteError>,
    conflicts: Vec<String>,
    writes: Vec<String>,
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, filename: &str, content: serde_json::Value) {
        let mut inner = self.inner.lock().await;
        inner.next_revision += 1;
        let revision = format!("rev-{}", inner.next_revision);
        inner
            .documents
            .insert(filename.to_string(), RemoteDocument { content, revision });
    }

    pub async fn document(&self, filename: &str) -> Option<serde_json::Value> {
        let inner = self.inner.lock().await;
        inner.documents.get(filename).map(|d| d.content.clone())
    }

    pub async fn fail_reads_of(&self, filename: &str, error: RemoteError) {
        let mut inner = self.inner.lock().await;
        inner.read_failures.insert(filename.to_string(), error);
    }

    pub async fn fail_writes_to(&self, filename: &str, error: RemoteError) {
        let mut inner = self.inner.lock().await;
        inner.write_failures.insert(filename.to_string(), error);
    }

    /// Report the next write to `filename` as a stale-revision conflict.
    pub async fn conflict_on(&self, filename: &str) {
        let mut inner = self.inner.lock().await;
        inner.conflicts.push(filename.to_string());
    }

    /// Filenames of committed writes, in order.
    pub async fn writes(&self) -> Vec<String> {
        self.inner.lock().await.writes.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, filename: &str) -> Result<DocumentState, RemoteError> {
        let inner = self.inner.lock().await;
        if let Some(error) = inner.read_failures.get(filename) {
            return Err(error.clone());
        }
        Ok(match inner.documents.get(filename) {
            Some(document) => DocumentState::Fresh(document.clone()),
            None => DocumentState::NotFound,
        })
    }

    async fn put(
        &self,
        filename: &str,
        content: &serde_json::Value,
        _message: &str,
    ) -> Result<WriteOutcome, RemoteError> {
        let mut inner = self.inner.lock().await;
        if let Some(error) = inner.write_failures.get(filename) {
            return Err(error.clone());
        }
        if let Some(index) = inner.conflicts.iter().position(|f| f == filename) {
            inner.conflicts.remove(index);
            return Ok(WriteOutcome::Conflict {
                message: format!("{} was modified concurrently", filename),
            });
        }

        inner.next_revision += 1;
        let revision = format!("rev-{}", inner.next_revision);
        inner.documents.insert(
            filename.to_string(),
            RemoteDocument {
                content: content.clone(),
                revision: revision.clone(),
            },
        );
        inner.writes.push(filename.to_string());

        Ok(WriteOutcome::Committed {
            commit: format!("commit-{}", revision),
            revision,
        })
    }

    async fn validate_repository(&self) -> RepositoryValidation {
        RepositoryValidation {
            valid: true,
            repo: Some("memory/roster".to_string()),
            default_branch: Some("main".to_string()),
            ..Default::default()
        }
    }

    async fn test_connectivity(&self) -> Connectivity {
        Connectivity {
            reachable: true,
            reason: None,
            metadata: Some(RepositoryMetadata {
                full_name: "memory/roster".to_string(),
                default_branch: "main".to_string(),
                is_private: false,
                description: None,
            }),
        }
    }
}
