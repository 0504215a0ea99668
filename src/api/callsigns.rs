//! Call-sign lookup endpoint for the member form.

use axum::extract::{Query, State};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::callsign::{self, Assignment};
use crate::errors::AppError;
use crate::models::Department;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsignQuery {
    #[serde(default)]
    pub title: Option<String>,
    /// Explicit department key, used when the title has no mapping.
    #[serde(default)]
    pub department: Option<String>,
    /// Member being edited; its own call sign stays available.
    #[serde(default)]
    pub member_id: Option<String>,
}

/// GET /api/callsigns - Department and available call signs for a title.
///
/// Returns `null` data when the title is unknown and no department was given.
pub async fn get_callsigns(
    State(state): State<AppState>,
    Query(query): Query<CallsignQuery>,
) -> ApiResult<Option<Assignment>> {
    let members = state.store.list_members().await?;
    let editing_id = query.member_id.as_deref().filter(|id| !id.is_empty());

    let assignment = match query.department.as_deref().filter(|d| !d.is_empty()) {
        Some(key) => {
            let department = Department::from_key(key)
                .ok_or_else(|| AppError::Validation(format!("Unknown department {}", key)))?;
            Some(Assignment {
                department,
                label: department.label(),
                options: callsign::allocate(department, &members, editing_id),
            })
        }
        None => query
            .title
            .as_deref()
            .and_then(|title| callsign::assignment_for_title(title, &members, editing_id)),
    };

    success(assignment)
}
