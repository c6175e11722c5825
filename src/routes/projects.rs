use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Identity, Operation, ResourceKind, Role};
use crate::db::members::add_member;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::gateway::authorize;
use crate::jwt::AuthUser;
use crate::models::project::{DbProject, Project, ProjectCreateRequest, ProjectWithRole};
use crate::utils::utc_now;

const PROJECT_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";

#[derive(Debug, FromRow)]
struct DbProjectWithRole {
    #[sqlx(flatten)]
    project: DbProject,
    role: String,
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    responses(
        (status = 200, description = "Projects the caller belongs to", body = [ProjectWithRole]),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_projects(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<ProjectWithRole>>> {
    let rows = sqlx::query_as::<_, DbProjectWithRole>(
        "SELECT p.id, p.name, p.description, p.created_by, p.created_at, p.updated_at, m.role \
         FROM projects p INNER JOIN project_members m ON m.project_id = p.id \
         WHERE m.user_id = ? ORDER BY p.created_at DESC",
    )
    .bind(auth.user_id)
    .fetch_all(&state.pool)
    .await?;

    let projects = rows
        .into_iter()
        .map(|row| -> AppResult<ProjectWithRole> {
            Ok(ProjectWithRole {
                role: Role::from_stored(&row.role)?,
                project: row.project.try_into()?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created; the caller is its admin", body = ProjectWithRole),
        (status = 400, description = "Empty name"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<ProjectWithRole>)> {
    payload.validate()?;

    let now = utc_now();
    let project = Project {
        id: Uuid::new_v4(),
        name: payload.name,
        description: payload.description,
        created_by: auth.user_id,
        created_at: now,
        updated_at: now,
    };

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO projects (id, name, description, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(project.id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.created_by)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(&mut *tx)
    .await?;

    let membership = add_member(&mut *tx, project.id, auth.user_id, Role::Admin).await?;

    tx.commit().await?;

    log_activity(&state.event_bus, "created", Some(auth.user_id), Some(project.id), &project);
    log_activity(&state.event_bus, "added", Some(auth.user_id), Some(project.id), &membership);

    Ok((
        StatusCode::CREATED,
        Json(ProjectWithRole {
            project,
            role: membership.role,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}",
    tag = "Projects",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail", body = Project),
        (status = 403, description = "Caller is not a member of the project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    identity: Identity,
) -> AppResult<Json<Project>> {
    authorize(state.evaluator.as_ref(), &identity, project_id, ResourceKind::Project, Operation::Retrieve).await?;
    let project = fetch_project(&state.pool, project_id).await?;
    Ok(Json(project.try_into()?))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}",
    tag = "Projects",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project, its members and its tags deleted"),
        (status = 403, description = "Caller may not delete this project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    identity: Identity,
) -> AppResult<StatusCode> {
    authorize(state.evaluator.as_ref(), &identity, project_id, ResourceKind::Project, Operation::Delete).await?;
    let project: Project = fetch_project(&state.pool, project_id).await?.try_into()?;

    let mut tx = state.pool.begin().await?;
    for table in ["tags", "project_members"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE project_id = ?"))
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log_activity(&state.event_bus, "deleted", identity.user_id(), Some(project_id), &project);

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<DbProject> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?");
    sqlx::query_as::<_, DbProject>(&sql)
        .bind(project_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("project not found"))
}
