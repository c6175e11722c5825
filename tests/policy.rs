mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use annotation_rbac::authz::RoleRegistry;
use annotation_rbac::create_app_with;
use annotation_rbac::jwt::JwtConfig;

use common::{assert_forbidden, setup, setup_with};

fn roles_for<'a>(policy: &'a Value, resource: &str, operation: &str) -> Option<&'a Value> {
    policy
        .as_array()?
        .iter()
        .find(|entry| entry["resource"] == resource && entry["operation"] == operation)
        .map(|entry| &entry["roles"])
}

#[tokio::test]
async fn default_policy_is_published() -> Result<()> {
    let t = setup().await?;

    let (status, roles) = t.send("GET", "/api/roles", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roles, json!(["project_admin", "annotation_approver", "annotator"]));

    let (status, policy) = t.send("GET", "/api/policy", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        roles_for(&policy, "tag", "list"),
        Some(&json!(["project_admin", "annotation_approver", "annotator"]))
    );
    assert_eq!(roles_for(&policy, "tag", "create"), Some(&json!(["project_admin"])));
    assert_eq!(roles_for(&policy, "tag", "delete"), Some(&json!(["project_admin"])));
    assert_eq!(roles_for(&policy, "tag", "update"), None);

    Ok(())
}

#[tokio::test]
async fn override_lets_approvers_create_tags() -> Result<()> {
    let registry = RoleRegistry::default()
        .with_overrides([("AUTHZ_TAG_CREATE_ROLES", "project_admin,annotation_approver")])?;
    let t = setup_with(registry).await?;
    let f = t.fixture().await?;

    let (status, _) = t.create_tag(&f.approver, &f.project_id, "positive").await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = t.create_tag(&f.annotator, &f.project_id, "negative").await?;
    assert_forbidden(status, &body);

    // delete keeps its default
    let (_, tags) = t
        .send("GET", &format!("/projects/{}/tags", f.project_id), Some(&f.approver.token), None)
        .await?;
    let tag_id = tags[0]["id"].as_str().unwrap_or_default().to_string();
    let (status, body) = t
        .send(
            "DELETE",
            &format!("/projects/{}/tags/{}", f.project_id, tag_id),
            Some(&f.approver.token),
            None,
        )
        .await?;
    assert_forbidden(status, &body);

    Ok(())
}

#[tokio::test]
async fn incomplete_policy_refuses_to_start() -> Result<()> {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
    let jwt = JwtConfig {
        secret: std::sync::Arc::new(b"test-secret".to_vec()),
        exp_hours: 1,
    };
    let registry = RoleRegistry::empty().declare(
        annotation_rbac::authz::ResourceKind::Tag,
        annotation_rbac::authz::Operation::List,
        [annotation_rbac::authz::Role::Annotator],
    );

    assert!(create_app_with(pool, jwt, registry).is_err());

    Ok(())
}
