use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    pub db_error: Option<String>,
    /// Number of (resource, operation) pairs in the loaded policy.
    pub policy_entries: usize,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_check = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await;
    let (db_ok, db_error) = match db_check {
        Ok(_) => (true, None),
        Err(err) => (false, Some(err.to_string())),
    };

    Json(HealthResponse {
        status: if db_ok { "ok" } else { "degraded" },
        db_ok,
        db_error,
        policy_entries: state.registry.iter().count(),
    })
}
