//! Admin credential model.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ADMIN_USERNAME: &str = "EMS";
pub const DEFAULT_ADMIN_PASSWORD: &str = "7408574";

/// The singleton admin credential as stored locally and in `admin.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredential {
    pub username: String,
    /// Password hash: an Argon2id PHC string, or a legacy rolling hash that
    /// is upgraded on the next successful login.
    pub password: String,
}

/// Request body for logging in.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
}

/// Request body for changing the admin credential.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCredentialsRequest {
    pub username: String,
    pub password: String,
}
