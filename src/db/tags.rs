use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::ResourceKind;
use crate::errors::AppResult;
use crate::gateway::ResourceStore;
use crate::models::tag::{DbTag, Tag, TagCreateRequest};
use crate::utils::utc_now;

#[derive(Debug, Clone)]
pub struct SqliteTagStore {
    pool: SqlitePool,
}

impl SqliteTagStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceStore for SqliteTagStore {
    type Resource = Tag;
    type Payload = TagCreateRequest;

    const KIND: ResourceKind = ResourceKind::Tag;

    fn validate(payload: &TagCreateRequest) -> AppResult<()> {
        payload.validate()
    }

    async fn list(&self, project_id: Uuid) -> AppResult<Vec<Tag>> {
        let rows = sqlx::query_as::<_, DbTag>(
            "SELECT id, project_id, text, created_at FROM tags WHERE project_id = ? ORDER BY rowid ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Tag::try_from).collect()
    }

    async fn find(&self, project_id: Uuid, id: Uuid) -> AppResult<Option<Tag>> {
        sqlx::query_as::<_, DbTag>(
            "SELECT id, project_id, text, created_at FROM tags WHERE id = ? AND project_id = ?",
        )
        .bind(id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Tag::try_from)
        .transpose()
    }

    async fn insert(&self, project_id: Uuid, payload: TagCreateRequest) -> AppResult<Tag> {
        let tag = Tag {
            id: Uuid::new_v4(),
            project_id,
            text: payload.text,
            created_at: utc_now(),
        };

        sqlx::query("INSERT INTO tags (id, project_id, text, created_at) VALUES (?, ?, ?, ?)")
            .bind(tag.id)
            .bind(tag.project_id)
            .bind(&tag.text)
            .bind(tag.created_at)
            .execute(&self.pool)
            .await?;

        Ok(tag)
    }

    async fn remove(&self, project_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ? AND project_id = ?")
            .bind(id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
