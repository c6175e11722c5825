use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

use crate::authz::{MembershipStore, ResourceKind, Role};
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::gateway::{ResourceStore, UpdatableResourceStore};
use crate::models::membership::{DbMembership, MemberCreateRequest, MemberUpdateRequest, Membership};
use crate::utils::utc_now;

const MEMBER_COLUMNS: &str = "project_id, user_id, role, created_at, updated_at";
const ALREADY_MEMBER: &str = "user is already a member of this project";
const LAST_ADMIN: &str = "a project must keep at least one project_admin";

/// Row-level guard: the write keeps the row an admin (first bind is the new
/// role, empty for a removal), or the row is not an admin, or another admin
/// remains in the project (second bind).
const KEEPS_AN_ADMIN: &str = "(? = 'project_admin' OR role <> 'project_admin' OR \
     (SELECT COUNT(1) FROM project_members WHERE project_id = ? AND role = 'project_admin') > 1)";

/// Memberships persisted in `project_members`, keyed by `(project_id, user_id)`.
///
/// Every mutation is a single statement, so a concurrent `lookup` observes
/// either the old row or the new one.
#[derive(Debug, Clone)]
pub struct SqliteMembershipStore {
    pool: SqlitePool,
}

impl SqliteMembershipStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, project_id: Uuid, user_id: Uuid, role: Role) -> AppResult<Membership> {
        ensure_user_exists(&self.pool, user_id).await?;
        if self.lookup(user_id, project_id).await?.is_some() {
            return Err(AppError::conflict(ALREADY_MEMBER));
        }
        add_member(&self.pool, project_id, user_id, role).await
    }

    /// Changes a member's role. Demoting the project's last admin is a
    /// `Conflict`; the guard is part of the same statement as the update.
    pub async fn change_role(&self, project_id: Uuid, user_id: Uuid, role: Role) -> AppResult<Option<Membership>> {
        let sql = format!(
            "UPDATE project_members SET role = ?, updated_at = ? \
             WHERE project_id = ? AND user_id = ? AND {KEEPS_AN_ADMIN} \
             RETURNING {MEMBER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, DbMembership>(&sql)
            .bind(role.as_str())
            .bind(utc_now())
            .bind(project_id)
            .bind(user_id)
            .bind(role.as_str())
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(row) => Ok(Some(row.try_into()?)),
            None => self.explain_untouched(project_id, user_id).await.map(|()| None),
        }
    }

    /// Removes a membership. Removing the project's last admin is a `Conflict`.
    pub async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let sql = format!("DELETE FROM project_members WHERE project_id = ? AND user_id = ? AND {KEEPS_AN_ADMIN}");
        let result = sqlx::query(&sql)
            .bind(project_id)
            .bind(user_id)
            .bind("")
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        self.explain_untouched(project_id, user_id).await.map(|()| false)
    }

    /// A guarded write matched nothing: either there is no such member, or
    /// the member is the last admin.
    async fn explain_untouched(&self, project_id: Uuid, user_id: Uuid) -> AppResult<()> {
        match self.lookup(user_id, project_id).await? {
            Some(existing) if existing.role == Role::Admin => Err(AppError::conflict(LAST_ADMIN)),
            _ => Ok(()),
        }
    }

    pub async fn members_of(&self, project_id: Uuid) -> AppResult<Vec<Membership>> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM project_members WHERE project_id = ? ORDER BY rowid ASC");
        let rows = sqlx::query_as::<_, DbMembership>(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Membership::try_from).collect()
    }
}

/// Inserts a membership using any executor, so project creation can add the
/// creator inside its own transaction.
pub async fn add_member<'e, E>(executor: E, project_id: Uuid, user_id: Uuid, role: Role) -> AppResult<Membership>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let now = utc_now();
    sqlx::query(
        "INSERT INTO project_members (project_id, user_id, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(user_id)
    .bind(role.as_str())
    .bind(now)
    .bind(now)
    .execute(executor)
    .await
    .map_err(|err| conflict_on_unique(err, ALREADY_MEMBER))?;

    Ok(Membership {
        project_id,
        user_id,
        role,
        created_at: now,
        updated_at: now,
    })
}

async fn ensure_user_exists(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    if count == 0 {
        return Err(AppError::not_found("user not found"));
    }
    Ok(())
}

#[async_trait]
impl MembershipStore for SqliteMembershipStore {
    async fn lookup(&self, user_id: Uuid, project_id: Uuid) -> AppResult<Option<Membership>> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM project_members WHERE project_id = ? AND user_id = ?");
        sqlx::query_as::<_, DbMembership>(&sql)
            .bind(project_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Membership::try_from)
            .transpose()
    }
}

/// Memberships are themselves a gated project resource, identified by user id.
#[async_trait]
impl ResourceStore for SqliteMembershipStore {
    type Resource = Membership;
    type Payload = MemberCreateRequest;

    const KIND: ResourceKind = ResourceKind::Member;

    async fn list(&self, project_id: Uuid) -> AppResult<Vec<Membership>> {
        self.members_of(project_id).await
    }

    async fn find(&self, project_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>> {
        self.lookup(user_id, project_id).await
    }

    async fn insert(&self, project_id: Uuid, payload: MemberCreateRequest) -> AppResult<Membership> {
        self.add(project_id, payload.user_id, payload.role).await
    }

    async fn remove(&self, project_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        self.remove_member(project_id, user_id).await
    }
}

#[async_trait]
impl UpdatableResourceStore for SqliteMembershipStore {
    type Changes = MemberUpdateRequest;

    async fn update(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        changes: MemberUpdateRequest,
    ) -> AppResult<Option<Membership>> {
        self.change_role(project_id, user_id, changes.role).await
    }
}
