//! Application assembly
//!
//! `Platform` wires repositories and services over one pool and builds the
//! HTTP router: the REST APIs under `/api`, health checks, Swagger UI and
//! the middleware stack.

use std::sync::Arc;

use axum::{http::HeaderValue, middleware, Router};
use sqlx::SqlitePool;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::openapi::schema::Type;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::{Components, ObjectBuilder, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::account_api::{account_router, AccountState};
use crate::auth::account_service::AccountService;
use crate::auth::auth_api::{auth_router, AuthState};
use crate::auth::authentication_service::AuthenticationService;
use crate::auth::email::EmailSender;
use crate::auth::identity::{IdentityManager, LockoutPolicy};
use crate::auth::password_service::{Argon2Config, PasswordPolicy, PasswordService};
use crate::auth::refresh_token_repository::RefreshTokenRepository;
use crate::auth::token_service::{TokenConfig, TokenService};
use crate::permission::api::{permissions_router, PermissionsState};
use crate::permission::repository::PermissionRepository;
use crate::permission::service::PermissionService;
use crate::role::api::{roles_router, RolesState};
use crate::role::repository::{RolePermissionRepository, RoleRepository};
use crate::role::service::RoleService;
use crate::security::api::{security_router, SecurityState};
use crate::security::repository::SecurityRepository;
use crate::security::service::SecurityService;
use crate::seed::DataSeeder;
use crate::shared::authorization::{AuthorizationService, PolicyMap};
use crate::shared::health_api::{health_router, HealthState};
use crate::shared::middleware::{AppState, AuthLayer};
use crate::shared::request_logging::{handle_panic, request_logging};
use crate::user::api::{users_router, UsersState};
use crate::user::repository::{UserRepository, UserRoleRepository};
use crate::user::service::UserService;

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";
pub const SWAGGER_PATH: &str = "/swagger-ui";

/// Every service of the platform, built over one pool
#[derive(Clone)]
pub struct Platform {
    pub pool: SqlitePool,
    pub passwords: Arc<PasswordService>,
    pub tokens: Arc<TokenService>,
    pub policies: Arc<PolicyMap>,
    pub security: SecurityService,
    pub users: Arc<UserService>,
    pub roles: Arc<RoleService>,
    pub permissions: Arc<PermissionService>,
    pub authentication: Arc<AuthenticationService>,
    pub account: Arc<AccountService>,
    pub health: HealthState,
    authz: Arc<AuthorizationService>,
    seed: gm_config::SeedConfig,
    cors_origins: Vec<String>,
}

impl Platform {
    pub fn new(
        pool: SqlitePool,
        config: &gm_config::AppConfig,
        email: Arc<dyn EmailSender>,
        argon2: Argon2Config,
    ) -> Self {
        let user_repo = Arc::new(UserRepository::new(pool.clone()));
        let user_role_repo = Arc::new(UserRoleRepository::new(pool.clone()));
        let role_repo = Arc::new(RoleRepository::new(pool.clone()));
        let role_permission_repo = Arc::new(RolePermissionRepository::new(pool.clone()));
        let permission_repo = Arc::new(PermissionRepository::new(pool.clone()));
        let refresh_token_repo = Arc::new(RefreshTokenRepository::new(pool.clone()));

        let passwords = Arc::new(PasswordService::new(argon2, PasswordPolicy::from(&config.security.password)));
        let tokens = Arc::new(TokenService::new(TokenConfig::from(&config.jwt)));
        let security = SecurityService::new(SecurityRepository::new(pool.clone()));

        let identity = Arc::new(IdentityManager::new(
            user_repo.clone(),
            user_role_repo.clone(),
            role_permission_repo.clone(),
            passwords.clone(),
            LockoutPolicy::from(&config.security),
        ));

        let users = Arc::new(UserService::new(
            user_repo.clone(),
            user_role_repo.clone(),
            role_repo.clone(),
            refresh_token_repo.clone(),
            identity.clone(),
            security.clone(),
        ));
        let roles = Arc::new(RoleService::new(
            role_repo,
            role_permission_repo.clone(),
            permission_repo.clone(),
        ));
        let permissions = Arc::new(PermissionService::new(permission_repo));

        let authentication = Arc::new(AuthenticationService::new(
            identity.clone(),
            user_repo.clone(),
            users.clone(),
            refresh_token_repo.clone(),
            tokens.clone(),
            email,
            security.clone(),
            config.email.frontend_base_url.clone(),
        ));
        let account = Arc::new(AccountService::new(
            user_repo.clone(),
            refresh_token_repo,
            identity.clone(),
            security.clone(),
        ));
        let authz = Arc::new(AuthorizationService::new(
            user_repo,
            user_role_repo,
            role_permission_repo,
            identity,
        ));

        Self {
            health: HealthState::new(pool.clone(), Some(env!("CARGO_PKG_VERSION").to_string())),
            pool,
            passwords,
            tokens,
            policies: Arc::new(PolicyMap::defaults()),
            security,
            users,
            roles,
            permissions,
            authentication,
            account,
            authz,
            seed: config.seed.clone(),
            cors_origins: config.http.cors_origins.clone(),
        }
    }

    pub fn seeder(&self) -> DataSeeder {
        DataSeeder::new(self.pool.clone(), self.passwords.clone(), self.seed.clone())
    }

    /// REST APIs with their collected OpenAPI document.
    pub fn api(&self) -> (Router, OpenApi) {
        let (router, mut openapi) = OpenApiRouter::new()
            .nest("/api/auth", auth_router(AuthState { service: self.authentication.clone() }))
            .nest(
                "/api/account",
                account_router(AccountState { service: self.account.clone(), policies: self.policies.clone() }),
            )
            .nest(
                "/api/users",
                users_router(UsersState { service: self.users.clone(), policies: self.policies.clone() }),
            )
            .nest(
                "/api/roles",
                roles_router(RolesState { service: self.roles.clone(), policies: self.policies.clone() }),
            )
            .nest(
                "/api/permissions",
                permissions_router(PermissionsState {
                    service: self.permissions.clone(),
                    policies: self.policies.clone(),
                }),
            )
            .nest(
                "/api/security",
                security_router(SecurityState { service: self.security.clone(), policies: self.policies.clone() }),
            )
            .split_for_parts();

        let components = openapi.components.get_or_insert_with(Components::new);
        // flattened into query structs, so never collected
        components.schemas.insert(
            "PaginationParams".to_string(),
            ObjectBuilder::new()
                .property("page", ObjectBuilder::new().schema_type(Type::Integer))
                .property("size", ObjectBuilder::new().schema_type(Type::Integer))
                .into(),
        );
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );

        openapi.info.title = "GestMantIA API".to_string();
        openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
        openapi.info.description = Some("Identity, access control and security administration".to_string());

        (router, openapi)
    }

    /// Full application router with the middleware stack applied.
    pub fn router(&self) -> Router {
        let (api, openapi) = self.api();
        let app_state = AppState {
            token_service: self.tokens.clone(),
            authz_service: self.authz.clone(),
        };

        Router::new()
            .merge(api)
            .nest("/health", health_router(self.health.clone()))
            .merge(SwaggerUi::new(SWAGGER_PATH).url(OPENAPI_PATH, openapi))
            .layer(AuthLayer::new(app_state))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(middleware::from_fn(request_logging))
            .layer(TraceLayer::new_for_http())
            .layer(self.cors())
    }

    fn cors(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        if origins.is_empty() {
            layer.allow_origin(Any)
        } else {
            layer.allow_origin(origins)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::email::LoggingEmailSender;
    use crate::db::connect_in_memory;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn platform() -> Platform {
        let pool = connect_in_memory().await.unwrap();
        let config = gm_config::AppConfig::default();
        Platform::new(pool, &config, Arc::new(LoggingEmailSender), Argon2Config::testing())
    }

    #[tokio::test]
    async fn test_openapi_document_lists_api_paths() {
        let (_, openapi) = platform().await.api();
        let json = serde_json::to_value(&openapi).unwrap();
        let paths = json["paths"].as_object().unwrap();

        assert!(paths.contains_key("/api/auth/login"));
        assert!(paths.contains_key("/api/users/{id}"));
        assert!(paths.contains_key("/api/roles/{id}/permissions"));
        assert!(paths.contains_key("/api/security/alerts/{id}/resolve"));
        assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
    }

    #[tokio::test]
    async fn test_router_serves_openapi_json() {
        let app = platform().await.router();
        let response = app
            .oneshot(Request::builder().uri(OPENAPI_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["info"]["title"], "GestMantIA API");
    }

    #[tokio::test]
    async fn test_protected_route_without_token_is_401() {
        let app = platform().await.router();
        let response = app
            .oneshot(Request::builder().uri("/api/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
