//! Admin session authentication module.
//!
//! Tokens are issued on login and checked with constant-time comparison to
//! mitigate timing attacks.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{codes, ErrorDetails, ErrorResponse};

/// Header name for the session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// In-memory registry of live admin sessions.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, DateTime<Utc>>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a new token, returning it with its expiry.
    pub async fn create(&self) -> (String, DateTime<Utc>) {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let expires_at = Utc::now() + self.ttl;

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, expiry| *expiry > Utc::now());
        sessions.insert(token.clone(), expires_at);

        (token, expires_at)
    }

    /// Whether `token` names a live session.
    pub async fn validate(&self, token: &str) -> bool {
        let now = Utc::now();
        let sessions = self.sessions.read().await;
        // Scan every entry so the time taken does not depend on which one matches.
        sessions.iter().fold(false, |found, (candidate, expiry)| {
            found | (constant_time_compare(candidate, token) && *expiry > now)
        })
    }

    pub async fn revoke(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    /// Drop every session, e.g. after the admin credential changed.
    pub async fn revoke_all(&self) {
        self.sessions.write().await.clear();
    }
}

/// Session token from `x-session-token` or an `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Session authentication layer function that takes the session registry as a parameter.
pub async fn session_auth_layer(
    sessions: Arc<SessionStore>,
    request: Request,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers()) else {
        return unauthorized_response("Missing session token");
    };

    if sessions.validate(&token).await {
        next.run(request).await
    } else {
        unauthorized_response("Invalid or expired session")
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    // Constant-time comparison
    a_bytes.ct_eq(b_bytes).into()
}

/// Create an unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
            details: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
