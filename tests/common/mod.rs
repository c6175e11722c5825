#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use annotation_rbac::authz::RoleRegistry;
use annotation_rbac::create_app_with;
use annotation_rbac::jwt::JwtConfig;

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

#[derive(Debug, Clone)]
pub struct Caller {
    pub token: String,
    pub id: String,
}

/// A project with one member per role and a registered non-member.
pub struct Fixture {
    pub project_id: String,
    pub admin: Caller,
    pub approver: Caller,
    pub annotator: Caller,
    pub outsider: Caller,
}

impl Fixture {
    pub fn members(&self) -> [&Caller; 3] {
        [&self.admin, &self.approver, &self.annotator]
    }
}

pub async fn setup() -> Result<TestApp> {
    setup_with(RoleRegistry::default()).await
}

pub async fn setup_with(registry: RoleRegistry) -> Result<TestApp> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    let jwt = JwtConfig {
        secret: Arc::new(b"test-secret".to_vec()),
        exp_hours: 1,
    };
    let app = create_app_with(pool.clone(), jwt, registry)?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    /// Sends one request and returns the status with the decoded JSON body
    /// (`Value::Null` for an empty body).
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        self.send_request(req).await
    }

    pub async fn send_request(&self, req: Request<Body>) -> Result<(StatusCode, Value)> {
        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&body_bytes)))?
        };
        Ok((status, value))
    }

    pub async fn register(&self, name: &str, email: &str) -> Result<Caller> {
        let (status, body) = self
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "password123" })),
            )
            .await?;
        if status != StatusCode::CREATED {
            panic!("register failed: {} - {}", status, body);
        }

        Ok(Caller {
            token: body["token"].as_str().context("missing token")?.to_string(),
            id: body["user"]["id"].as_str().context("missing user id")?.to_string(),
        })
    }

    pub async fn create_project(&self, owner: &Caller, name: &str) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/projects",
                Some(&owner.token),
                Some(json!({ "name": name, "description": "sentiment labels" })),
            )
            .await?;
        if status != StatusCode::CREATED {
            panic!("project create failed: {} - {}", status, body);
        }
        Ok(body["id"].as_str().context("missing project id")?.to_string())
    }

    pub async fn add_member(&self, admin: &Caller, project_id: &str, user: &Caller, role: &str) -> Result<()> {
        let (status, body) = self
            .send(
                "POST",
                &format!("/projects/{}/members", project_id),
                Some(&admin.token),
                Some(json!({ "user_id": user.id, "role": role })),
            )
            .await?;
        if status != StatusCode::CREATED {
            panic!("add member failed: {} - {}", status, body);
        }
        Ok(())
    }

    pub async fn create_tag(&self, caller: &Caller, project_id: &str, text: &str) -> Result<(StatusCode, Value)> {
        self.send(
            "POST",
            &format!("/projects/{}/tags", project_id),
            Some(&caller.token),
            Some(json!({ "text": text })),
        )
        .await
    }

    pub async fn fixture(&self) -> Result<Fixture> {
        let admin = self.register("Admin", "admin@example.com").await?;
        let approver = self.register("Approver", "approver@example.com").await?;
        let annotator = self.register("Annotator", "annotator@example.com").await?;
        let outsider = self.register("Outsider", "outsider@example.com").await?;

        let project_id = self.create_project(&admin, "Reviews").await?;
        self.add_member(&admin, &project_id, &approver, "annotation_approver").await?;
        self.add_member(&admin, &project_id, &annotator, "annotator").await?;

        Ok(Fixture {
            project_id,
            admin,
            approver,
            annotator,
            outsider,
        })
    }
}

pub fn tag_texts(body: &Value) -> Vec<String> {
    body.as_array()
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| tag["text"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub const FORBIDDEN: &str = "forbidden";

pub fn assert_forbidden(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::FORBIDDEN, "expected 403, got {} - {}", status, body);
    assert_eq!(body["error"], FORBIDDEN, "unexpected error body: {}", body);
}
