//! Synchronization between the local record store and the remote document store.
//!
//! Pull merges `members.json` into the local collection (union by id, remote
//! wins) and takes `admin.json` as-is. Push writes both documents from local
//! state. Only one pull or push runs at a time; a call made while another is
//! running returns [`SyncOutcome::Skipped`] without touching anything.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::db::RecordStore;
use crate::errors::AppError;
use crate::models::{AdminCredential, Member, RepoCoordinates, SyncStatus};
use crate::remote::{
    DocumentState, DocumentStore, FailureKind, GitHubDocumentStore, RemoteError, WriteOutcome,
    ADMIN_DOCUMENT, MEMBERS_DOCUMENT,
};

/// One document that could not be synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub document: String,
    pub kind: FailureKind,
    pub message: String,
}

impl SyncFailure {
    fn from_error(document: &str, error: &RemoteError) -> Self {
        Self {
            document: document.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    fn conflict(document: &str, message: String) -> Self {
        Self {
            document: document.to_string(),
            kind: FailureKind::Conflict,
            message,
        }
    }
}

/// Result of a pull or push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SyncOutcome {
    #[serde(rename_all = "camelCase")]
    Completed { members: usize, synced_at: String },
    /// Another sync was already running.
    Skipped,
    /// Remote sync is not configured.
    Disabled,
    Failed { failures: Vec<SyncFailure> },
}

impl SyncOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }
}

/// Per-document result of preparing the remote repository.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DocumentInit {
    Exists { document: String },
    Created { document: String },
    Failed { failure: SyncFailure },
}

/// Merge remote members into local ones: remote records first in remote
/// order, then local records whose id the remote set lacks.
///
/// Records deleted remotely survive here because they are still present
/// locally.
pub fn merge_members(remote: Vec<Member>, local: Vec<Member>) -> Vec<Member> {
    let remote_ids: HashSet<String> = remote.iter().map(|m| m.id.clone()).collect();
    let mut merged = remote;
    merged.extend(local.into_iter().filter(|m| !remote_ids.contains(&m.id)));
    merged
}

/// Resets the in-flight flag when a sync finishes.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Remote sync session: the current client, the in-flight flag and the
/// periodic pull task.
pub struct SyncSession {
    client: RwLock<Option<Arc<dyn DocumentStore>>>,
    syncing: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
    api_base: String,
    interval: Duration,
}

impl SyncSession {
    pub fn new(api_base: impl Into<String>, interval: Duration) -> Self {
        Self {
            client: RwLock::new(None),
            syncing: AtomicBool::new(false),
            ticker: Mutex::new(None),
            api_base: api_base.into(),
            interval,
        }
    }

    /// Build a GitHub client for `repo` against the configured API base.
    pub fn github_client(&self, repo: RepoCoordinates) -> Result<GitHubDocumentStore, RemoteError> {
        GitHubDocumentStore::new(&self.api_base, repo)
    }

    /// Install a client without starting the periodic pull.
    pub async fn attach(&self, client: Arc<dyn DocumentStore>) {
        *self.client.write().await = Some(client);
    }

    pub async fn is_enabled(&self) -> bool {
        self.client.read().await.is_some()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    async fn current_client(&self) -> Option<Arc<dyn DocumentStore>> {
        self.client.read().await.clone()
    }

    fn try_begin(&self) -> Option<SyncGuard<'_>> {
        self.syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard(&self.syncing))
    }

    /// Enable remote sync for `repo`: persist the configuration, build the
    /// client and start the periodic pull. Calling it again rebuilds both.
    pub async fn enable(
        self: &Arc<Self>,
        store: &Arc<RecordStore>,
        repo: RepoCoordinates,
    ) -> Result<(), AppError> {
        let client = self.github_client(repo.clone())?;

        store.set_repo_config(Some(&repo)).await?;
        store.set_cloud_enabled(true).await?;
        self.activate(store, Arc::new(client)).await;

        tracing::info!(repo = %repo.full_name(), branch = %repo.branch, "Remote sync enabled");
        Ok(())
    }

    /// Install `client` and (re)start the periodic pull against `store`.
    pub async fn activate(
        self: &Arc<Self>,
        store: &Arc<RecordStore>,
        client: Arc<dyn DocumentStore>,
    ) {
        self.attach(client).await;
        self.start_ticker(store).await;
    }

    /// Disable remote sync: stop the periodic pull and drop the client.
    /// Repository coordinates stay stored for the next enable.
    pub async fn disable(&self, store: &RecordStore) -> Result<(), AppError> {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
        *self.client.write().await = None;
        store.set_cloud_enabled(false).await?;

        tracing::info!("Remote sync disabled");
        Ok(())
    }

    /// Re-enable sync at startup when it was enabled in a previous run.
    pub async fn restore(self: &Arc<Self>, store: &Arc<RecordStore>) -> Result<(), AppError> {
        let state = store.sync_state().await?;
        match (state.cloud_enabled, state.repo) {
            (true, Some(repo)) => self.enable(store, repo).await,
            (true, None) => {
                tracing::warn!("Remote sync flagged enabled without repository coordinates");
                store.set_cloud_enabled(false).await
            }
            _ => Ok(()),
        }
    }

    async fn start_ticker(self: &Arc<Self>, store: &Arc<RecordStore>) {
        let session: Weak<SyncSession> = Arc::downgrade(self);
        let store = Arc::clone(store);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                match session.pull(&store).await {
                    Ok(outcome) => tracing::debug!(?outcome, "Periodic pull finished"),
                    Err(e) => tracing::error!("Periodic pull failed: {}", e),
                }
            }
        });

        if let Some(previous) = self.ticker.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Merge remote state into the local store.
    ///
    /// Nothing is written locally unless both documents were read.
    pub async fn pull(&self, store: &RecordStore) -> Result<SyncOutcome, AppError> {
        let Some(client) = self.current_client().await else {
            return Ok(SyncOutcome::Disabled);
        };
        let Some(_guard) = self.try_begin() else {
            tracing::debug!("Pull skipped: sync already in progress");
            return Ok(SyncOutcome::Skipped);
        };

        let mut failures = Vec::new();

        let remote_members = match client.get(MEMBERS_DOCUMENT).await {
            Ok(DocumentState::Fresh(doc)) => match serde_json::from_value::<Vec<Member>>(doc.content) {
                Ok(members) => Some(members),
                Err(e) => {
                    failures.push(SyncFailure::from_error(
                        MEMBERS_DOCUMENT,
                        &RemoteError::Decode(e.to_string()),
                    ));
                    None
                }
            },
            Ok(DocumentState::NotFound) => None,
            Err(e) => {
                failures.push(SyncFailure::from_error(MEMBERS_DOCUMENT, &e));
                None
            }
        };

        let remote_admin = match client.get(ADMIN_DOCUMENT).await {
            Ok(DocumentState::Fresh(doc)) => match serde_json::from_value::<AdminCredential>(doc.content) {
                Ok(admin) => Some(admin),
                Err(e) => {
                    failures.push(SyncFailure::from_error(
                        ADMIN_DOCUMENT,
                        &RemoteError::Decode(e.to_string()),
                    ));
                    None
                }
            },
            Ok(DocumentState::NotFound) => None,
            Err(e) => {
                failures.push(SyncFailure::from_error(ADMIN_DOCUMENT, &e));
                None
            }
        };

        if !failures.is_empty() {
            tracing::warn!(?failures, "Pull failed");
            return Ok(SyncOutcome::Failed { failures });
        }

        let members = match remote_members {
            Some(remote) => store.merge_remote_members(remote).await?,
            None => store.list_members().await?.len(),
        };
        if let Some(admin) = remote_admin {
            store.replace_admin_record(&admin).await?;
        }

        let synced_at = store.record_sync().await?;
        tracing::info!(members, "Pulled remote state");

        Ok(SyncOutcome::Completed { members, synced_at })
    }

    /// Write the local members and admin credential to the remote store.
    ///
    /// Both documents are always attempted; the push only completes when both
    /// writes commit. A half-finished push is not rolled back.
    pub async fn push(&self, store: &RecordStore) -> Result<SyncOutcome, AppError> {
        let Some(client) = self.current_client().await else {
            return Ok(SyncOutcome::Disabled);
        };
        let Some(_guard) = self.try_begin() else {
            tracing::debug!("Push skipped: sync already in progress");
            return Ok(SyncOutcome::Skipped);
        };

        let members = store.list_members().await?;
        let admin = store
            .admin_record()
            .await?
            .ok_or_else(|| AppError::Internal("Admin credential missing".to_string()))?;

        let members_json = serde_json::to_value(&members)
            .map_err(|e| AppError::Internal(format!("Failed to encode members: {}", e)))?;
        let admin_json = serde_json::to_value(&admin)
            .map_err(|e| AppError::Internal(format!("Failed to encode admin: {}", e)))?;

        let mut failures = Vec::new();
        for (document, content, message) in [
            (MEMBERS_DOCUMENT, &members_json, "Update members data"),
            (ADMIN_DOCUMENT, &admin_json, "Update admin data"),
        ] {
            match client.put(document, content, message).await {
                Ok(WriteOutcome::Committed { revision, .. }) => {
                    tracing::debug!(document, %revision, "Document pushed");
                }
                Ok(WriteOutcome::Conflict { message }) => {
                    failures.push(SyncFailure::conflict(document, message));
                }
                Err(e) => failures.push(SyncFailure::from_error(document, &e)),
            }
        }

        if !failures.is_empty() {
            tracing::warn!(?failures, "Push not fully successful");
            return Ok(SyncOutcome::Failed { failures });
        }

        let synced_at = store.record_sync().await?;
        tracing::info!(members = members.len(), "Pushed local state");
        Ok(SyncOutcome::Completed {
            members: members.len(),
            synced_at,
        })
    }

    /// Push after a local change without waiting for the result.
    pub fn push_in_background(self: &Arc<Self>, store: &Arc<RecordStore>) {
        let session = Arc::clone(self);
        let store = Arc::clone(store);
        tokio::spawn(async move {
            match session.push(&store).await {
                Ok(SyncOutcome::Failed { failures }) => {
                    tracing::warn!(?failures, "Background push failed");
                }
                Ok(outcome) => tracing::debug!(?outcome, "Background push finished"),
                Err(e) => tracing::error!("Background push failed: {}", e),
            }
        });
    }

    /// Create `members.json` and `admin.json` from local state when missing.
    pub async fn initialize_repository(
        &self,
        store: &RecordStore,
    ) -> Result<Vec<DocumentInit>, AppError> {
        let Some(client) = self.current_client().await else {
            return Err(AppError::Validation("Remote sync is not enabled".to_string()));
        };

        let admin = store
            .admin_record()
            .await?
            .ok_or_else(|| AppError::Internal("Admin credential missing".to_string()))?;
        let defaults = [
            (MEMBERS_DOCUMENT, serde_json::json!([]), "Initialize members data"),
            (
                ADMIN_DOCUMENT,
                serde_json::to_value(&admin)
                    .map_err(|e| AppError::Internal(format!("Failed to encode admin: {}", e)))?,
                "Initialize admin data",
            ),
        ];

        let mut results = Vec::new();
        for (document, content, message) in defaults {
            let result = match client.get(document).await {
                Ok(DocumentState::Fresh(_)) => DocumentInit::Exists {
                    document: document.to_string(),
                },
                Ok(DocumentState::NotFound) => match client.put(document, &content, message).await {
                    Ok(WriteOutcome::Committed { .. }) => {
                        tracing::info!(document, "Created remote document");
                        DocumentInit::Created {
                            document: document.to_string(),
                        }
                    }
                    Ok(WriteOutcome::Conflict { message }) => DocumentInit::Failed {
                        failure: SyncFailure::conflict(document, message),
                    },
                    Err(e) => DocumentInit::Failed {
                        failure: SyncFailure::from_error(document, &e),
                    },
                },
                Err(e) => DocumentInit::Failed {
                    failure: SyncFailure::from_error(document, &e),
                },
            };
            results.push(result);
        }

        Ok(results)
    }

    /// Current sync status, with the access token redacted.
    pub async fn status(&self, store: &RecordStore) -> Result<SyncStatus, AppError> {
        let state = store.sync_state().await?;
        Ok(SyncStatus {
            cloud_enabled: state.cloud_enabled,
            connected: self.is_enabled().await,
            syncing: self.is_syncing(),
            last_sync: state.last_sync,
            has_token: state.repo.as_ref().is_some_and(|r| r.token.is_some()),
            repo: state.repo.map(|r| r.redacted()),
        })
    }
}
