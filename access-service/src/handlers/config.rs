use service_core::axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{ConfigKeyResponse, ConfigQuery, ErrorResponse, RegistryEntryResponse, RegistryWriteRequest};
use crate::middleware::{CurrentMember, RequestContext};
use crate::models::ConfigKey;
use crate::services::{RegistryWrite, ResolvedConfig, ServiceError};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/config",
    params(ConfigQuery),
    responses(
        (status = 200, description = "Effective configuration with per-key sources", body = ResolvedConfig),
        (status = 401, description = "Missing request context", body = ErrorResponse)
    ),
    tag = "Configuration"
)]
pub async fn get_config(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ConfigQuery>,
) -> Result<Json<ResolvedConfig>, AppError> {
    let resolved = state
        .config_service
        .resolve(&ctx.config_context(), query.refresh)
        .await?;
    Ok(Json(resolved.as_ref().clone()))
}

#[utoipa::path(
    get,
    path = "/config/{key}",
    params(("key" = String, Path, description = "Dot-namespaced config key")),
    responses(
        (status = 200, description = "Resolved value and its source", body = ConfigKeyResponse),
        (status = 401, description = "Missing request context", body = ErrorResponse),
        (status = 404, description = "No layer defines the key", body = ErrorResponse)
    ),
    tag = "Configuration"
)]
pub async fn get_config_key(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_key): Path<String>,
) -> Result<Json<ConfigKeyResponse>, AppError> {
    let key = ConfigKey::parse(&raw_key).map_err(|_| ServiceError::UnknownConfigKey(raw_key.clone()))?;
    let (value, source) = state
        .config_service
        .lookup(&ctx.config_context(), &key)
        .await?
        .ok_or(ServiceError::UnknownConfigKey(raw_key))?;

    Ok(Json(ConfigKeyResponse {
        key: key.to_string(),
        value,
        source,
    }))
}

#[utoipa::path(
    put,
    path = "/config/registry",
    request_body = RegistryWriteRequest,
    responses(
        (status = 200, description = "Override stored", body = RegistryEntryResponse),
        (status = 400, description = "Invalid key or scope", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Configuration"
)]
pub async fn put_registry_entry(
    State(state): State<AppState>,
    member: CurrentMember,
    Json(req): Json<RegistryWriteRequest>,
) -> Result<Json<RegistryEntryResponse>, AppError> {
    req.validate()?;
    let key = ConfigKey::parse(&req.key).map_err(ServiceError::ValidationError)?;

    let stored = state
        .config_service
        .write_override(
            member.membership.organization_id,
            RegistryWrite {
                key,
                value: req.value,
                scope: req.scope,
                project_id: req.project_id,
                user_id: req.user_id,
            },
            member.context.user_id,
        )
        .await?;

    Ok(Json(stored.into()))
}
