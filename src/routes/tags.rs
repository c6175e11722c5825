use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Identity, Operation};
use crate::errors::AppResult;
use crate::events::log_activity;
use crate::models::tag::{Tag, TagCreateRequest};
use crate::routes::gated_body;

#[utoipa::path(
    get,
    path = "/projects/{project_id}/tags",
    tag = "Tags",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Tags of the project in creation order", body = [Tag]),
        (status = 403, description = "Caller is not a member of the project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_tags(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    identity: Identity,
) -> AppResult<Json<Vec<Tag>>> {
    let tags = state.tags.list(&identity, project_id).await?;
    Ok(Json(tags))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/tags",
    tag = "Tags",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = TagCreateRequest,
    responses(
        (status = 201, description = "Tag created", body = Tag),
        (status = 400, description = "Missing or empty text"),
        (status = 403, description = "Caller may not create tags in this project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_tag(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    identity: Identity,
    body: Result<Json<TagCreateRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Tag>)> {
    let payload = gated_body(state.tags.as_ref(), &identity, project_id, Operation::Create, body).await?;
    let tag = state.tags.create(&identity, project_id, payload).await?;
    log_activity(&state.event_bus, "created", identity.user_id(), Some(project_id), &tag);
    Ok((StatusCode::CREATED, Json(tag)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/tags/{tag_id}",
    tag = "Tags",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("tag_id" = Uuid, Path, description = "Tag id")
    ),
    responses(
        (status = 200, description = "Tag detail", body = Tag),
        (status = 403, description = "Caller is not a member of the project"),
        (status = 404, description = "No such tag in this project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_tag(
    State(state): State<AppState>,
    Path((project_id, tag_id)): Path<(Uuid, Uuid)>,
    identity: Identity,
) -> AppResult<Json<Tag>> {
    let tag = state.tags.retrieve(&identity, project_id, tag_id).await?;
    Ok(Json(tag))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/tags/{tag_id}",
    tag = "Tags",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("tag_id" = Uuid, Path, description = "Tag id")
    ),
    responses(
        (status = 204, description = "Tag deleted"),
        (status = 403, description = "Caller may not delete tags in this project"),
        (status = 404, description = "No such tag in this project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_tag(
    State(state): State<AppState>,
    Path((project_id, tag_id)): Path<(Uuid, Uuid)>,
    identity: Identity,
) -> AppResult<StatusCode> {
    let removed = state.tags.delete(&identity, project_id, tag_id).await?;
    log_activity(&state.event_bus, "deleted", identity.user_id(), Some(project_id), &removed);
    Ok(StatusCode::NO_CONTENT)
}
