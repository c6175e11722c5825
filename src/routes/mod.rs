use axum::extract::rejection::JsonRejection;
use axum::Json;
use uuid::Uuid;

use crate::authz::{Identity, Operation};
use crate::errors::{AppError, AppResult};
use crate::gateway::{ResourceGateway, ResourceStore};

pub mod auth;
pub mod health;
pub mod members;
pub mod policy;
pub mod projects;
pub mod tags;

/// Unwraps a JSON body for a gated operation. A body that fails to parse is
/// reported as 400 only to callers the gateway would let through; everyone
/// else gets the usual 403.
pub(crate) async fn gated_body<S, T>(
    gateway: &ResourceGateway<S>,
    identity: &Identity,
    project_id: Uuid,
    operation: Operation,
    body: Result<Json<T>, JsonRejection>,
) -> AppResult<T>
where
    S: ResourceStore,
{
    match body {
        Ok(Json(payload)) => Ok(payload),
        Err(rejection) => {
            gateway.authorize(identity, project_id, operation).await?;
            Err(AppError::bad_request(rejection.body_text()))
        }
    }
}
