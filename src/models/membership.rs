use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppError;
use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Membership {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
impl Membership {
    pub fn new(project_id: Uuid, user_id: Uuid, role: Role) -> Self {
        let now = Utc::now();
        Self {
            project_id,
            user_id,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self.updated_at = Utc::now();
        self
    }
}

impl Loggable for Membership {
    fn entity_type() -> &'static str { "membership" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMembership {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbMembership> for Membership {
    type Error = AppError;

    fn try_from(value: DbMembership) -> Result<Self, Self::Error> {
        let role = Role::from_stored(&value.role)?;

        Ok(Membership {
            project_id: value.project_id,
            user_id: value.user_id,
            role,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberCreateRequest {
    pub user_id: Uuid,
    #[schema(example = "annotator")]
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberUpdateRequest {
    #[schema(example = "annotation_approver")]
    pub role: Role,
}
