//! Login, logout and admin credential endpoints.

use axum::{extract::State, http::HeaderMap, Json};

use super::{success, ApiResult};
use crate::auth::session_token;
use crate::errors::AppError;
use crate::models::{LoginRequest, LoginResponse, UpdateCredentialsRequest};
use crate::AppState;

async fn issue_session(state: &AppState) -> LoginResponse {
    let (token, expires_at) = state.sessions.create().await;
    LoginResponse {
        token,
        expires_at: expires_at.to_rfc3339(),
    }
}

/// POST /api/auth/login - Exchange the admin credential for a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let username = request.username.trim();
    if !state
        .store
        .verify_credentials(username, &request.password)
        .await?
    {
        tracing::warn!(username, "Rejected admin login");
        return Err(AppError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }

    tracing::info!(username, "Admin logged in");
    success(issue_session(&state).await)
}

/// POST /api/auth/logout - End the current session.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<()> {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token).await;
    }
    success(())
}

/// PUT /api/admin/credentials - Replace the admin username and password.
///
/// Every existing session is ended; the response carries a fresh one.
pub async fn update_credentials(
    State(state): State<AppState>,
    Json(request): Json<UpdateCredentialsRequest>,
) -> ApiResult<LoginResponse> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if request.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    state.store.set_credentials(username, &request.password).await?;
    state.sessions.revoke_all().await;
    state.sync.push_in_background(&state.store);

    success(issue_session(&state).await)
}
