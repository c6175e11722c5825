use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::Loggable;

/// A short label attachable to annotated documents, owned by one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Tag {
    pub id: Uuid,
    pub project_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Loggable for Tag {
    fn entity_type() -> &'static str { "tag" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTag {
    pub id: Uuid,
    pub project_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbTag> for Tag {
    type Error = AppError;

    fn try_from(value: DbTag) -> Result<Self, Self::Error> {
        Ok(Tag {
            id: value.id,
            project_id: value.project_id,
            text: value.text,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TagCreateRequest {
    #[schema(example = "positive")]
    pub text: String,
}

impl TagCreateRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.text.trim().is_empty() {
            return Err(AppError::bad_request("text must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        for text in ["", "   ", "\n\t"] {
            let req = TagCreateRequest { text: text.to_string() };
            assert!(matches!(req.validate(), Err(AppError::BadRequest(_))), "{text:?}");
        }
        assert!(TagCreateRequest { text: " spaced ".into() }.validate().is_ok());
    }
}
