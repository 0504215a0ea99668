//! Public roster API endpoints.

use axum::extract::State;

use super::{success, ApiResult};
use crate::models::{build_roster, Department, DepartmentInfo, RosterSection};
use crate::AppState;

/// GET /api/roster - Members grouped by department.
pub async fn get_roster(State(state): State<AppState>) -> ApiResult<Vec<RosterSection>> {
    let members = state.store.list_members().await?;
    success(build_roster(&members))
}

/// GET /api/departments - The department table with call-sign pools.
pub async fn list_departments() -> ApiResult<Vec<DepartmentInfo>> {
    success(Department::ALL.into_iter().map(DepartmentInfo::from).collect())
}
