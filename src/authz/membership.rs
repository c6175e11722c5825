use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::membership::Membership;

#[cfg(test)]
pub use in_memory::InMemoryMembershipStore;

/// Read side of the membership relation, consulted on every request.
///
/// A missing membership is `Ok(None)`, never an error. Implementations must
/// return either the state before or after a concurrent role change, never a
/// mix of the two.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn lookup(&self, user_id: Uuid, project_id: Uuid) -> AppResult<Option<Membership>>;

    async fn is_member(&self, user_id: Uuid, project_id: Uuid) -> AppResult<bool> {
        Ok(self.lookup(user_id, project_id).await?.is_some())
    }
}

#[async_trait]
impl<T: MembershipStore + ?Sized> MembershipStore for Arc<T> {
    async fn lookup(&self, user_id: Uuid, project_id: Uuid) -> AppResult<Option<Membership>> {
        (**self).lookup(user_id, project_id).await
    }
}
