//! Resource gateway
//!
//! Every project-owned resource is reached through a [`ResourceGateway`],
//! which asks the permission evaluator before touching storage. The check
//! always runs before validation and before any existence lookup, so a caller
//! without access learns nothing about what the project contains.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::authz::{Decision, Identity, Operation, PermissionEvaluator, ResourceKind};
use crate::errors::{AppError, AppResult};

/// Storage for one kind of project-owned resource. Every method is already
/// scoped to `project_id`; a resource of another project is simply absent.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    type Resource: Send + Sync;
    type Payload: Send + Sync;

    const KIND: ResourceKind;

    /// Shape checks on a create payload, run after authorization.
    fn validate(_payload: &Self::Payload) -> AppResult<()> {
        Ok(())
    }

    /// All resources of the project in insertion order.
    async fn list(&self, project_id: Uuid) -> AppResult<Vec<Self::Resource>>;

    async fn find(&self, project_id: Uuid, id: Uuid) -> AppResult<Option<Self::Resource>>;

    async fn insert(&self, project_id: Uuid, payload: Self::Payload) -> AppResult<Self::Resource>;

    /// Returns `false` when nothing matched.
    async fn remove(&self, project_id: Uuid, id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait UpdatableResourceStore: ResourceStore {
    type Changes: Send + Sync;

    async fn update(
        &self,
        project_id: Uuid,
        id: Uuid,
        changes: Self::Changes,
    ) -> AppResult<Option<Self::Resource>>;
}

/// Maps a decision to the gateway outcome: `Denied` is always the uniform
/// `Forbidden` error.
pub async fn authorize(
    evaluator: &dyn PermissionEvaluator,
    identity: &Identity,
    project_id: Uuid,
    kind: ResourceKind,
    operation: Operation,
) -> AppResult<()> {
    match evaluator.evaluate(identity, project_id, kind, operation).await? {
        Decision::Allowed => Ok(()),
        Decision::Denied => {
            tracing::debug!(%project_id, %kind, %operation, "request forbidden");
            Err(AppError::forbidden())
        }
    }
}

pub struct ResourceGateway<S> {
    evaluator: Arc<dyn PermissionEvaluator>,
    store: S,
}

impl<S: ResourceStore> ResourceGateway<S> {
    pub fn new(evaluator: Arc<dyn PermissionEvaluator>, store: S) -> Self {
        Self { evaluator, store }
    }

    pub async fn list(&self, identity: &Identity, project_id: Uuid) -> AppResult<Vec<S::Resource>> {
        self.authorize(identity, project_id, Operation::List).await?;
        self.store.list(project_id).await
    }

    pub async fn retrieve(&self, identity: &Identity, project_id: Uuid, id: Uuid) -> AppResult<S::Resource> {
        self.authorize(identity, project_id, Operation::Retrieve).await?;
        self.store
            .find(project_id, id)
            .await?
            .ok_or_else(Self::not_found)
    }

    pub async fn create(
        &self,
        identity: &Identity,
        project_id: Uuid,
        payload: S::Payload,
    ) -> AppResult<S::Resource> {
        self.authorize(identity, project_id, Operation::Create).await?;
        S::validate(&payload)?;
        self.store.insert(project_id, payload).await
    }

    /// Removes the resource and returns it as it was before removal.
    pub async fn delete(&self, identity: &Identity, project_id: Uuid, id: Uuid) -> AppResult<S::Resource> {
        self.authorize(identity, project_id, Operation::Delete).await?;

        let existing = self
            .store
            .find(project_id, id)
            .await?
            .ok_or_else(Self::not_found)?;

        // lost a race with a concurrent delete
        if !self.store.remove(project_id, id).await? {
            return Err(Self::not_found());
        }

        Ok(existing)
    }

    /// The gateway's authorization check on its own, for callers that must
    /// decide access before they can build a payload.
    pub async fn authorize(&self, identity: &Identity, project_id: Uuid, operation: Operation) -> AppResult<()> {
        authorize(self.evaluator.as_ref(), identity, project_id, S::KIND, operation).await
    }

    fn not_found() -> AppError {
        AppError::not_found(format!("{} not found", S::KIND))
    }
}

impl<S: UpdatableResourceStore> ResourceGateway<S> {
    pub async fn update(
        &self,
        identity: &Identity,
        project_id: Uuid,
        id: Uuid,
        changes: S::Changes,
    ) -> AppResult<S::Resource> {
        self.authorize(identity, project_id, Operation::Update).await?;
        self.store
            .update(project_id, id, changes)
            .await?
            .ok_or_else(Self::not_found)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::authz::{InMemoryMembershipStore, MembershipEvaluator, Role, RoleRegistry};
    use crate::models::tag::{Tag, TagCreateRequest};

    #[derive(Default)]
    struct VecTagStore {
        tags: Mutex<Vec<Tag>>,
    }

    #[async_trait]
    impl ResourceStore for VecTagStore {
        type Resource = Tag;
        type Payload = TagCreateRequest;

        const KIND: ResourceKind = ResourceKind::Tag;

        fn validate(payload: &TagCreateRequest) -> AppResult<()> {
            payload.validate()
        }

        async fn list(&self, project_id: Uuid) -> AppResult<Vec<Tag>> {
            let tags = self.tags.lock().unwrap();
            Ok(tags.iter().filter(|t| t.project_id == project_id).cloned().collect())
        }

        async fn find(&self, project_id: Uuid, id: Uuid) -> AppResult<Option<Tag>> {
            let tags = self.tags.lock().unwrap();
            Ok(tags.iter().find(|t| t.project_id == project_id && t.id == id).cloned())
        }

        async fn insert(&self, project_id: Uuid, payload: TagCreateRequest) -> AppResult<Tag> {
            let tag = Tag {
                id: Uuid::new_v4(),
                project_id,
                text: payload.text,
                created_at: Utc::now(),
            };
            self.tags.lock().unwrap().push(tag.clone());
            Ok(tag)
        }

        async fn remove(&self, project_id: Uuid, id: Uuid) -> AppResult<bool> {
            let mut tags = self.tags.lock().unwrap();
            let before = tags.len();
            tags.retain(|t| !(t.project_id == project_id && t.id == id));
            Ok(tags.len() != before)
        }
    }

    struct Fixture {
        gateway: ResourceGateway<VecTagStore>,
        project: Uuid,
        admin: Identity,
        approver: Identity,
        annotator: Identity,
        outsider: Identity,
    }

    fn fixture() -> Fixture {
        let memberships = Arc::new(InMemoryMembershipStore::new());
        let project = Uuid::new_v4();
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        memberships.add(ids[0], project, Role::Admin).unwrap();
        memberships.add(ids[1], project, Role::Approver).unwrap();
        memberships.add(ids[2], project, Role::Annotator).unwrap();

        let evaluator = Arc::new(MembershipEvaluator::new(Arc::new(RoleRegistry::default()), memberships));
        Fixture {
            gateway: ResourceGateway::new(evaluator, VecTagStore::default()),
            project,
            admin: Identity::User(ids[0]),
            approver: Identity::User(ids[1]),
            annotator: Identity::User(ids[2]),
            outsider: Identity::User(ids[3]),
        }
    }

    fn text(value: &str) -> TagCreateRequest {
        TagCreateRequest { text: value.to_string() }
    }

    fn is_forbidden<T>(result: &AppResult<T>) -> bool {
        matches!(result, Err(AppError::Forbidden(_)))
    }

    #[tokio::test]
    async fn admin_create_returns_submitted_text() {
        let f = fixture();
        let tag = f.gateway.create(&f.admin, f.project, text("needs review")).await.unwrap();
        assert_eq!(tag.text, "needs review");
        assert_eq!(tag.project_id, f.project);
    }

    #[tokio::test]
    async fn non_admin_create_is_forbidden_and_persists_nothing() {
        let f = fixture();
        for member in [&f.approver, &f.annotator, &f.outsider, &Identity::Anonymous] {
            let result = f.gateway.create(member, f.project, text("spam")).await;
            assert!(is_forbidden(&result), "{member:?}");
        }
        assert!(f.gateway.list(&f.admin, f.project).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn authorization_runs_before_validation() {
        let f = fixture();
        let denied = f.gateway.create(&f.annotator, f.project, text("  ")).await;
        assert!(is_forbidden(&denied));

        let invalid = f.gateway.create(&f.admin, f.project, text("  ")).await;
        assert!(matches!(invalid, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn members_list_in_insertion_order_and_others_are_forbidden() {
        let f = fixture();
        for t in ["a", "b", "c"] {
            f.gateway.create(&f.admin, f.project, text(t)).await.unwrap();
        }

        for member in [&f.admin, &f.approver, &f.annotator] {
            let texts: Vec<String> = f
                .gateway
                .list(member, f.project)
                .await
                .unwrap()
                .into_iter()
                .map(|t| t.text)
                .collect();
            assert_eq!(texts, ["a", "b", "c"]);
        }

        assert!(is_forbidden(&f.gateway.list(&f.outsider, f.project).await));
        assert!(is_forbidden(&f.gateway.list(&Identity::Anonymous, f.project).await));
    }

    #[tokio::test]
    async fn non_admin_delete_is_forbidden_and_tag_survives() {
        let f = fixture();
        let tag = f.gateway.create(&f.admin, f.project, text("keep")).await.unwrap();

        for member in [&f.approver, &f.annotator, &f.outsider, &Identity::Anonymous] {
            assert!(is_forbidden(&f.gateway.delete(member, f.project, tag.id).await), "{member:?}");
        }

        let still_there = f.gateway.retrieve(&f.annotator, f.project, tag.id).await.unwrap();
        assert_eq!(still_there, tag);
    }

    #[tokio::test]
    async fn forbidden_takes_precedence_over_not_found() {
        let f = fixture();
        let missing = Uuid::new_v4();

        let as_admin = f.gateway.delete(&f.admin, f.project, missing).await;
        assert!(matches!(as_admin, Err(AppError::NotFound(_))));

        assert!(is_forbidden(&f.gateway.delete(&f.outsider, f.project, missing).await));
        assert!(is_forbidden(&f.gateway.delete(&Identity::Anonymous, f.project, missing).await));
        assert!(is_forbidden(&f.gateway.retrieve(&f.outsider, f.project, missing).await));
    }

    #[tokio::test]
    async fn create_list_delete_round_trip() {
        let f = fixture();
        let tag = f.gateway.create(&f.admin, f.project, text("roundtrip")).await.unwrap();

        let listed = f.gateway.list(&f.admin, f.project).await.unwrap();
        assert_eq!(listed.iter().filter(|t| t.id == tag.id).count(), 1);

        let removed = f.gateway.delete(&f.admin, f.project, tag.id).await.unwrap();
        assert_eq!(removed.id, tag.id);

        let listed = f.gateway.list(&f.admin, f.project).await.unwrap();
        assert!(listed.iter().all(|t| t.id != tag.id));

        let again = f.gateway.delete(&f.admin, f.project, tag.id).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }
}
