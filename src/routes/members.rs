use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Identity, Operation};
use crate::errors::AppResult;
use crate::events::log_activity;
use crate::models::membership::{MemberCreateRequest, MemberUpdateRequest, Membership};
use crate::routes::gated_body;

#[utoipa::path(
    get,
    path = "/projects/{project_id}/members",
    tag = "Members",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project memberships", body = [Membership]),
        (status = 403, description = "Caller is not a member of the project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    identity: Identity,
) -> AppResult<Json<Vec<Membership>>> {
    let members = state.members.list(&identity, project_id).await?;
    Ok(Json(members))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/members",
    tag = "Members",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = MemberCreateRequest,
    responses(
        (status = 201, description = "Member added", body = Membership),
        (status = 403, description = "Caller may not manage members"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User already has a role in this project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    identity: Identity,
    body: Result<Json<MemberCreateRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Membership>)> {
    let payload = gated_body(state.members.as_ref(), &identity, project_id, Operation::Create, body).await?;
    let membership = state.members.create(&identity, project_id, payload).await?;
    log_activity(&state.event_bus, "added", identity.user_id(), Some(project_id), &membership);
    Ok((StatusCode::CREATED, Json(membership)))
}

#[utoipa::path(
    put,
    path = "/projects/{project_id}/members/{user_id}",
    tag = "Members",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("user_id" = Uuid, Path, description = "Member's user id")
    ),
    request_body = MemberUpdateRequest,
    responses(
        (status = 200, description = "Role changed", body = Membership),
        (status = 403, description = "Caller may not manage members"),
        (status = 404, description = "User is not a member of this project"),
        (status = 409, description = "Change would leave the project without a project_admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_member(
    State(state): State<AppState>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    identity: Identity,
    body: Result<Json<MemberUpdateRequest>, JsonRejection>,
) -> AppResult<Json<Membership>> {
    let changes = gated_body(state.members.as_ref(), &identity, project_id, Operation::Update, body).await?;
    let membership = state.members.update(&identity, project_id, user_id, changes).await?;
    log_activity(&state.event_bus, "updated", identity.user_id(), Some(project_id), &membership);
    Ok(Json(membership))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/members/{user_id}",
    tag = "Members",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("user_id" = Uuid, Path, description = "Member's user id")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Caller may not manage members"),
        (status = 404, description = "User is not a member of this project"),
        (status = 409, description = "Member is the project's last project_admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    identity: Identity,
) -> AppResult<StatusCode> {
    let removed = state.members.delete(&identity, project_id, user_id).await?;
    log_activity(&state.event_bus, "removed", identity.user_id(), Some(project_id), &removed);
    Ok(StatusCode::NO_CONTENT)
}
