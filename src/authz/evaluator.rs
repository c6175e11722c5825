use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::membership::MembershipStore;
use super::principal::Identity;
use super::registry::{RoleRegistry, RoleSet};
use super::{Decision, Operation, ResourceKind, Role};
use crate::errors::AppResult;

/// Pluggable permission check consulted by every resource gateway.
#[async_trait]
pub trait PermissionEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        identity: &Identity,
        project_id: Uuid,
        kind: ResourceKind,
        operation: Operation,
    ) -> AppResult<Decision>;
}

/// The policy decision proper: a role that is present and in the permitted
/// set is allowed, anything else is denied.
pub fn decide(role: Option<Role>, permitted: &RoleSet) -> Decision {
    match role {
        Some(role) if permitted.contains(&role) => Decision::Allowed,
        _ => Decision::Denied,
    }
}

/// Evaluator backed by project memberships.
///
/// Evaluation order:
/// 1. resolve the permitted roles for (kind, operation), failing on an undeclared pair
/// 2. anonymous -> deny
/// 3. no membership in the project -> deny
/// 4. membership role in permitted set -> allow, else deny
///
/// Nothing is cached; each call performs a fresh membership lookup.
pub struct MembershipEvaluator<M> {
    registry: Arc<RoleRegistry>,
    memberships: M,
}

impl<M: MembershipStore> MembershipEvaluator<M> {
    pub fn new(registry: Arc<RoleRegistry>, memberships: M) -> Self {
        Self { registry, memberships }
    }
}

#[async_trait]
impl<M: MembershipStore> PermissionEvaluator for MembershipEvaluator<M> {
    async fn evaluate(
        &self,
        identity: &Identity,
        project_id: Uuid,
        kind: ResourceKind,
        operation: Operation,
    ) -> AppResult<Decision> {
        let permitted = self.registry.permitted_roles(kind, operation)?;

        let Some(user_id) = identity.user_id() else {
            tracing::debug!(%project_id, %kind, %operation, "anonymous caller denied");
            return Ok(Decision::Denied);
        };

        let role = self
            .memberships
            .lookup(user_id, project_id)
            .await?
            .map(|membership| membership.role);

        let decision = decide(role, permitted);
        tracing::debug!(
            %user_id,
            %project_id,
            %kind,
            %operation,
            role = ?role,
            decision = ?decision,
            "permission evaluated"
        );

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::InMemoryMembershipStore;
    use crate::errors::AppError;

    fn evaluator(store: Arc<InMemoryMembershipStore>) -> MembershipEvaluator<Arc<InMemoryMembershipStore>> {
        MembershipEvaluator::new(Arc::new(RoleRegistry::default()), store)
    }

    #[test]
    fn decide_requires_present_and_permitted_role() {
        let admin_only: RoleSet = [Role::Admin].into_iter().collect();
        assert_eq!(decide(Some(Role::Admin), &admin_only), Decision::Allowed);
        assert_eq!(decide(Some(Role::Approver), &admin_only), Decision::Denied);
        assert_eq!(decide(None, &admin_only), Decision::Denied);
    }

    #[tokio::test]
    async fn anonymous_and_non_members_are_denied_everything() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let project = Uuid::new_v4();
        let evaluator = evaluator(store);

        for identity in [Identity::Anonymous, Identity::User(Uuid::new_v4())] {
            for kind in ResourceKind::all() {
                for op in kind.operations() {
                    let decision = evaluator.evaluate(&identity, project, *kind, *op).await.unwrap();
                    assert_eq!(decision, Decision::Denied, "{identity:?} {kind}.{op}");
                }
            }
        }
    }

    #[tokio::test]
    async fn membership_in_another_project_grants_nothing_here() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let user = Uuid::new_v4();
        store.add(user, Uuid::new_v4(), Role::Admin).unwrap();

        let decision = evaluator(store)
            .evaluate(&Identity::User(user), Uuid::new_v4(), ResourceKind::Tag, Operation::List)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Denied);
    }

    #[tokio::test]
    async fn tag_policy_per_role() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let project = Uuid::new_v4();
        let users: Vec<(Role, Uuid)> = Role::all().iter().map(|r| (*r, Uuid::new_v4())).collect();
        for (role, user) in &users {
            store.add(*user, project, *role).unwrap();
        }
        let evaluator = evaluator(store);

        for (role, user) in users {
            let identity = Identity::User(user);
            let list = evaluator.evaluate(&identity, project, ResourceKind::Tag, Operation::List).await.unwrap();
            let create = evaluator.evaluate(&identity, project, ResourceKind::Tag, Operation::Create).await.unwrap();
            let delete = evaluator.evaluate(&identity, project, ResourceKind::Tag, Operation::Delete).await.unwrap();

            assert_eq!(list, Decision::Allowed);
            assert_eq!(create.is_allowed(), role == Role::Admin);
            assert_eq!(delete.is_allowed(), role == Role::Admin);
        }
    }

    #[tokio::test]
    async fn repeated_evaluation_is_stable() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let (user, project) = (Uuid::new_v4(), Uuid::new_v4());
        store.add(user, project, Role::Approver).unwrap();
        let evaluator = evaluator(store);

        let identity = Identity::User(user);
        let first = evaluator.evaluate(&identity, project, ResourceKind::Tag, Operation::Create).await.unwrap();
        for _ in 0..10 {
            let again = evaluator.evaluate(&identity, project, ResourceKind::Tag, Operation::Create).await.unwrap();
            assert_eq!(again, first);
        }
    }

    #[tokio::test]
    async fn role_change_takes_effect_on_next_evaluation() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let (user, project) = (Uuid::new_v4(), Uuid::new_v4());
        store.add(user, project, Role::Annotator).unwrap();
        let evaluator = evaluator(store.clone());
        let identity = Identity::User(user);

        let before = evaluator.evaluate(&identity, project, ResourceKind::Tag, Operation::Delete).await.unwrap();
        assert_eq!(before, Decision::Denied);

        store.change_role(user, project, Role::Admin).unwrap();
        let after = evaluator.evaluate(&identity, project, ResourceKind::Tag, Operation::Delete).await.unwrap();
        assert_eq!(after, Decision::Allowed);

        store.remove(user, project).unwrap();
        let removed = evaluator.evaluate(&identity, project, ResourceKind::Tag, Operation::List).await.unwrap();
        assert_eq!(removed, Decision::Denied);
    }

    #[tokio::test]
    async fn undeclared_operation_fails_with_configuration_error() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let err = evaluator(store)
            .evaluate(&Identity::Anonymous, Uuid::new_v4(), ResourceKind::Tag, Operation::Update)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
