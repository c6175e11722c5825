use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{MembershipEvaluator, PermissionEvaluator, RoleRegistry};
use crate::db::{SqliteMembershipStore, SqliteTagStore};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::gateway::ResourceGateway;
use crate::jwt::JwtConfig;
use crate::routes::{auth, health, members, policy, projects, tags};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub registry: Arc<RoleRegistry>,
    pub evaluator: Arc<dyn PermissionEvaluator>,
    pub tags: Arc<ResourceGateway<SqliteTagStore>>,
    pub members: Arc<ResourceGateway<SqliteMembershipStore>>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, registry: RoleRegistry, event_bus: EventBus) -> Self {
        let registry = Arc::new(registry);
        let evaluator: Arc<dyn PermissionEvaluator> = Arc::new(MembershipEvaluator::new(
            Arc::clone(&registry),
            SqliteMembershipStore::new(pool.clone()),
        ));

        Self {
            tags: Arc::new(ResourceGateway::new(
                Arc::clone(&evaluator),
                SqliteTagStore::new(pool.clone()),
            )),
            members: Arc::new(ResourceGateway::new(
                Arc::clone(&evaluator),
                SqliteMembershipStore::new(pool.clone()),
            )),
            pool,
            jwt: Arc::new(jwt),
            registry,
            evaluator,
            event_bus,
        }
    }
}

/// Builds the router with configuration read from the environment
/// (`JWT_SECRET`, `JWT_EXP_HOURS`, `AUTHZ_*_ROLES`).
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let registry = RoleRegistry::from_env()?;
    create_app_with(pool, jwt_config, registry)
}

pub fn create_app_with(pool: SqlitePool, jwt: JwtConfig, registry: RoleRegistry) -> Result<Router, AppError> {
    registry.ensure_complete()?;

    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt, registry, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route("/:project_id", get(projects::get_project).delete(projects::delete_project));

    // Tags are scoped to a project: /projects/:project_id/tags
    let tag_routes = Router::new()
        .route("/", get(tags::list_tags).post(tags::create_tag))
        .route("/:tag_id", get(tags::get_tag).delete(tags::delete_tag));

    let member_routes = Router::new()
        .route("/", get(members::list_members).post(members::add_member))
        .route("/:user_id", axum::routing::put(members::update_member).delete(members::remove_member));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/roles", get(policy::list_roles))
        .route("/api/policy", get(policy::get_policy))
        .nest("/auth", auth_routes)
        .nest("/projects", project_routes)
        .nest("/projects/:project_id/tags", tag_routes)
        .nest("/projects/:project_id/members", member_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
