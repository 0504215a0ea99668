//! Member API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{success, ApiResult};
use crate::callsign;
use crate::errors::AppError;
use crate::models::{CreateMemberRequest, Department, Member, UpdateMemberRequest};
use crate::AppState;

/// Largest accepted photo, measured after base64 decoding.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// Check a photo data URI: an image MIME type, base64 payload, at most
/// [`MAX_PHOTO_BYTES`] decoded.
fn validate_photo(photo: &str) -> Result<(), AppError> {
    let Some(rest) = photo.strip_prefix("data:image/") else {
        return Err(AppError::Validation(
            "Photo must be an image data URI".to_string(),
        ));
    };
    let Some((_, payload)) = rest.split_once(";base64,") else {
        return Err(AppError::Validation(
            "Photo must be base64 encoded".to_string(),
        ));
    };

    // Reject on length before decoding anything large.
    if payload.len() / 4 * 3 > MAX_PHOTO_BYTES + 2 {
        return Err(AppError::Validation("Photo exceeds 5 MB".to_string()));
    }
    let decoded = STANDARD
        .decode(payload)
        .map_err(|_| AppError::Validation("Photo is not valid base64".to_string()))?;
    if decoded.len() > MAX_PHOTO_BYTES {
        return Err(AppError::Validation("Photo exceeds 5 MB".to_string()));
    }
    Ok(())
}

/// Validate a member record about to be saved against the current roster.
fn validate_member(
    candidate: &Member,
    members: &[Member],
    editing_id: Option<&str>,
) -> Result<(), AppError> {
    if candidate.first_name.trim().is_empty() {
        return Err(AppError::Validation("First name is required".to_string()));
    }
    if candidate.last_name.trim().is_empty() {
        return Err(AppError::Validation("Last name is required".to_string()));
    }

    let department_key = candidate.department.trim();
    if department_key.is_empty() {
        return Err(AppError::Validation("Department is required".to_string()));
    }
    let department = Department::from_key(department_key).ok_or_else(|| {
        AppError::Validation(format!("Unknown department {}", department_key))
    })?;

    callsign::validate_callsign(department, candidate.callsign.trim(), members, editing_id)
        .map_err(AppError::Validation)?;

    if let Some(photo) = &candidate.photo {
        validate_photo(photo)?;
    }
    Ok(())
}

/// GET /api/members - List all members.
pub async fn list_members(State(state): State<AppState>) -> ApiResult<Vec<Member>> {
    success(state.store.list_members().await?)
}

/// GET /api/members/{id} - Get a single member.
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Member> {
    match state.store.get_member(&id).await? {
        Some(member) => success(member),
        None => Err(AppError::NotFound(format!("Member {} not found", id))),
    }
}

/// POST /api/members - Create a new member.
pub async fn create_member(
    State(state): State<AppState>,
    Json(request): Json<CreateMemberRequest>,
) -> ApiResult<Member> {
    let member = state
        .store
        .add_member(&request, |candidate, members| {
            validate_member(candidate, members, None)
        })
        .await?;
    state.sync.push_in_background(&state.store);

    success(member)
}

/// PUT /api/members/{id} - Update a member.
pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateMemberRequest>,
) -> ApiResult<Member> {
    let member = state
        .store
        .update_member(&id, &request, |candidate, members| {
            validate_member(candidate, members, Some(&id))
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;
    state.sync.push_in_background(&state.store);

    success(member)
}

/// DELETE /api/members/{id} - Delete a member. Deleting an unknown id succeeds.
pub async fn delete_member(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.store.delete_member(&id).await?;
    state.sync.push_in_background(&state.store);

    success(())
}
