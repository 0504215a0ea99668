//! Remote sync control endpoints.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{success, ApiResponse, ApiResult};
use crate::errors::{AppError, ErrorResponse};
use crate::models::{RepoCoordinates, SyncStatus};
use crate::remote::{Connectivity, DocumentStore, FailureKind, RepositoryValidation};
use crate::sync::{DocumentInit, SyncFailure, SyncOutcome};
use crate::AppState;

/// Result of configuring remote sync.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSetupReport {
    pub validation: RepositoryValidation,
    pub documents: Vec<DocumentInit>,
    pub push: SyncOutcome,
}

/// Result of the repository checks.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTestReport {
    pub validation: RepositoryValidation,
    pub connectivity: Connectivity,
}

/// Error envelope for failed documents: 409 when any write hit a stale
/// revision, 502 otherwise.
fn failure_response(failures: Vec<SyncFailure>) -> Response {
    let summary = failures
        .iter()
        .map(|f| format!("{}: {}", f.document, f.message))
        .collect::<Vec<_>>()
        .join("; ");
    let error = if failures.iter().any(|f| f.kind == FailureKind::Conflict) {
        AppError::Conflict(format!("Sync conflict: {}", summary))
    } else {
        AppError::Remote(format!("Sync failed: {}", summary))
    };

    let body = ErrorResponse::new(&error)
        .with_details(serde_json::json!({ "failures": failures }));
    (error.status_code(), Json(body)).into_response()
}

fn outcome_response(outcome: SyncOutcome) -> Result<Response, AppError> {
    match outcome {
        SyncOutcome::Disabled => Err(AppError::Validation(
            "Remote sync is not enabled".to_string(),
        )),
        SyncOutcome::Failed { failures } => Ok(failure_response(failures)),
        outcome => Ok(ApiResponse::new(outcome).into_response()),
    }
}

/// GET /api/sync/status - Current sync status.
pub async fn get_sync_status(State(state): State<AppState>) -> ApiResult<SyncStatus> {
    success(state.sync.status(&state.store).await?)
}

/// PUT /api/sync/config - Validate a repository, enable sync against it,
/// create any missing documents and push local state.
///
/// Nothing is stored when the repository is unusable.
pub async fn configure_sync(
    State(state): State<AppState>,
    Json(request): Json<RepoCoordinates>,
) -> Result<Response, AppError> {
    let repo = request.normalized();
    if repo.owner.is_empty() || repo.name.is_empty() {
        return Err(AppError::Validation(
            "Repository owner and name are required".to_string(),
        ));
    }

    let client = state.sync.github_client(repo.clone())?;
    let validation = client.validate_repository().await;
    if !validation.valid {
        return Err(AppError::Validation(validation.reason.unwrap_or_else(|| {
            format!("Repository {} is not accessible", repo.full_name())
        })));
    }
    if validation.requires_auth_for_private {
        return Err(AppError::Validation(format!(
            "Repository {} is private; an access token is required",
            repo.full_name()
        )));
    }

    state.sync.enable(&state.store, repo).await?;

    let documents = state.sync.initialize_repository(&state.store).await?;
    let failures: Vec<SyncFailure> = documents
        .iter()
        .filter_map(|d| match d {
            DocumentInit::Failed { failure } => Some(failure.clone()),
            _ => None,
        })
        .collect();
    if !failures.is_empty() {
        return Ok(failure_response(failures));
    }

    let push = state.sync.push(&state.store).await?;

    Ok(ApiResponse::new(SyncSetupReport {
        validation,
        documents,
        push,
    })
    .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct DisableSyncQuery {
    /// Also drop the stored repository coordinates and token.
    #[serde(default)]
    pub forget: bool,
}

/// DELETE /api/sync/config - Disable remote sync.
pub async fn disable_sync(
    State(state): State<AppState>,
    Query(query): Query<DisableSyncQuery>,
) -> ApiResult<SyncStatus> {
    state.sync.disable(&state.store).await?;
    if query.forget {
        state.store.set_repo_config(None).await?;
        tracing::info!("Repository configuration cleared");
    }
    success(state.sync.status(&state.store).await?)
}

/// POST /api/sync/pull - Merge remote state into the local store.
pub async fn pull(State(state): State<AppState>) -> Result<Response, AppError> {
    outcome_response(state.sync.pull(&state.store).await?)
}

/// POST /api/sync/push - Write local state to the remote store.
pub async fn push(State(state): State<AppState>) -> Result<Response, AppError> {
    outcome_response(state.sync.push(&state.store).await?)
}

/// POST /api/sync/test - Check the configured repository.
pub async fn test_sync(State(state): State<AppState>) -> ApiResult<SyncTestReport> {
    let Some(repo) = state.store.sync_state().await?.repo else {
        return Err(AppError::Validation(
            "Remote sync is not configured".to_string(),
        ));
    };

    let client = state.sync.github_client(repo)?;
    let validation = client.validate_repository().await;
    let connectivity = client.test_connectivity().await;

    success(SyncTestReport {
        validation,
        connectivity,
    })
}
