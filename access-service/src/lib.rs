pub mod config;
pub mod db;
pub mod defaults;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use service_core::axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{AccessConfig, Environment, SwaggerMode};
use crate::middleware::{ACCOUNT_ID_HEADER, PROJECT_ID_HEADER, USER_ID_HEADER};
use crate::services::{AccessStore, CachedCms, ConfigService, PermissionService};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::config::get_config,
        handlers::config::get_config_key,
        handlers::config::put_registry_entry,
        handlers::permissions::get_current_permissions,
        handlers::permissions::put_module_permissions,
        handlers::module_views::get_module_view,
        handlers::module_views::put_role_template,
        handlers::access::check_access,
        handlers::packs::list_packs,
        handlers::packs::apply_pack,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::ConfigKeyResponse,
            dtos::RegistryWriteRequest,
            dtos::RegistryEntryResponse,
            dtos::PermissionsResponse,
            dtos::RoleTemplateRequest,
            dtos::AccessResponse,
            dtos::PackApplicationResponse,
            services::ResolvedConfig,
            services::config_resolver::ResolvedSource,
            services::config_resolver::ResolutionMeta,
            services::DenyReason,
            services::access_guard::AccessLevel,
            models::ConfigKey,
            models::SourceTag,
            models::RegistryScope,
            models::MemberRole,
            models::RbacModule,
            models::RbacAction,
            models::ModulePermissions,
            models::PermissionMatrix,
            models::ModuleViewConfig,
            models::PackModule,
            models::PermissionPack,
        )
    ),
    tags(
        (name = "Configuration", description = "Layered configuration resolution and registry overrides"),
        (name = "Permissions", description = "Membership permission matrices"),
        (name = "Module Views", description = "Subview visibility per role and member"),
        (name = "Access", description = "Combined feature flag, permission and subview check"),
        (name = "Permission Packs", description = "Predefined permission bundles"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub store: Arc<dyn AccessStore>,
    pub config_service: ConfigService,
    pub permissions: PermissionService,
}

impl AppState {
    pub fn new(config: AccessConfig, store: Arc<dyn AccessStore>, cms: CachedCms) -> Self {
        let ttl = Duration::from_secs(config.cache.ttl_seconds);
        Self {
            config_service: ConfigService::new(store.clone(), cms, ttl),
            permissions: PermissionService::new(store.clone(), ttl),
            store,
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Administrative writes
    let admin_routes = Router::new()
        .route("/config/registry", put(handlers::config::put_registry_entry))
        .route(
            "/memberships/:member_id/permissions/:module",
            put(handlers::permissions::put_module_permissions),
        )
        .route(
            "/module-views/templates/:role/:module",
            put(handlers::module_views::put_role_template),
        )
        .route(
            "/memberships/:member_id/permission-packs/:pack_id",
            post(handlers::packs::apply_pack),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::admin_member_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    let swagger_enabled = match state.config.environment {
        Environment::Dev => true,
        Environment::Prod => state.config.swagger.enabled == SwaggerMode::Public,
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { service_core::axum::Json(ApiDoc::openapi()) }),
        );
    }

    let allowed_origins: Vec<HeaderValue> = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    app.route("/config", get(handlers::config::get_config))
        .route("/config/:key", get(handlers::config::get_config_key))
        .route(
            "/memberships/current/permissions",
            get(handlers::permissions::get_current_permissions),
        )
        .route(
            "/module-views/:module",
            get(handlers::module_views::get_module_view),
        )
        .route("/access/:module", get(handlers::access::check_access))
        .route("/permission-packs", get(handlers::packs::list_packs))
        .merge(admin_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::PUT, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static(ACCOUNT_ID_HEADER),
                    HeaderName::from_static(USER_ID_HEADER),
                    HeaderName::from_static(PROJECT_ID_HEADER),
                ]),
        )
}
