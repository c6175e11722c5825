use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::Role;
use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicyEntry {
    #[schema(example = "tag")]
    pub resource: &'static str,
    #[schema(example = "create")]
    pub operation: &'static str,
    pub roles: Vec<Role>,
}

#[utoipa::path(
    get,
    path = "/api/roles",
    tag = "Policy",
    responses((status = 200, description = "Roles a membership can hold", body = [Role]))
)]
pub async fn list_roles() -> Json<Vec<Role>> {
    Json(Role::all().to_vec())
}

/// The effective role registry, after any deployment overrides.
#[utoipa::path(
    get,
    path = "/api/policy",
    tag = "Policy",
    responses((status = 200, description = "Permitted roles per resource operation", body = [PolicyEntry]))
)]
pub async fn get_policy(State(state): State<AppState>) -> AppResult<Json<Vec<PolicyEntry>>> {
    let entries = state
        .registry
        .iter()
        .map(|(kind, operation, roles)| PolicyEntry {
            resource: kind.as_str(),
            operation: operation.as_str(),
            roles: roles.iter().copied().collect(),
        })
        .collect();

    Ok(Json(entries))
}
