use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::Role;
use crate::models;
use crate::routes::{self, policy::PolicyEntry};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::policy::list_roles,
		routes::policy::get_policy,
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::projects::list_projects,
		routes::projects::create_project,
		routes::projects::get_project,
		routes::projects::delete_project,
		routes::tags::list_tags,
		routes::tags::create_tag,
		routes::tags::get_tag,
		routes::tags::delete_tag,
		routes::members::list_members,
		routes::members::add_member,
		routes::members::update_member,
		routes::members::remove_member
	),
	components(
		schemas(
			Role,
			PolicyEntry,
			routes::health::HealthResponse,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::project::Project,
			models::project::ProjectWithRole,
			models::project::ProjectCreateRequest,
			models::tag::Tag,
			models::tag::TagCreateRequest,
			models::membership::Membership,
			models::membership::MemberCreateRequest,
			models::membership::MemberUpdateRequest
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Health", description = "Liveness and database status"),
		(name = "Auth", description = "Authentication endpoints"),
		(name = "Projects", description = "Project management"),
		(name = "Tags", description = "Project tags, gated by project role"),
		(name = "Members", description = "Project memberships and roles"),
		(name = "Policy", description = "Roles and the effective permission table")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(
				HttpBuilder::new()
					.scheme(HttpAuthScheme::Bearer)
					.bearer_format("JWT")
					.build(),
			),
		);
	}
}

pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
	let mut doc = ApiDoc::openapi();
	doc.servers = Some(vec![Server::new(format!("http://localhost:{port}"))]);
	doc
}

/// Swagger UI at `/docs`, document at `/api-docs/openapi.json`.
pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", doc))
}
