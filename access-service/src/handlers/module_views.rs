use service_core::axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use super::parse_module;
use crate::dtos::{ErrorResponse, RoleTemplateRequest};
use crate::middleware::CurrentMember;
use crate::models::{MemberRole, ModuleViewConfig};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/module-views/{module}",
    params(("module" = String, Path, description = "Module code")),
    responses(
        (status = 200, description = "Effective view config of the caller", body = ModuleViewConfig),
        (status = 403, description = "Caller has no membership", body = ErrorResponse),
        (status = 404, description = "Unknown module", body = ErrorResponse)
    ),
    tag = "Module Views"
)]
pub async fn get_module_view(
    State(state): State<AppState>,
    member: CurrentMember,
    Path(module): Path<String>,
) -> Result<Json<ModuleViewConfig>, AppError> {
    let module = parse_module(&module)?;
    let view = state
        .permissions
        .effective_view(&member.membership, module)
        .await?;
    Ok(Json(view))
}

#[utoipa::path(
    put,
    path = "/module-views/templates/{role}/{module}",
    params(
        ("role" = String, Path, description = "admin, member or guest"),
        ("module" = String, Path, description = "Module code")
    ),
    request_body = RoleTemplateRequest,
    responses(
        (status = 204, description = "Template stored"),
        (status = 400, description = "Unknown role", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Unknown module", body = ErrorResponse)
    ),
    tag = "Module Views"
)]
pub async fn put_role_template(
    State(state): State<AppState>,
    member: CurrentMember,
    Path((role, module)): Path<(String, String)>,
    Json(req): Json<RoleTemplateRequest>,
) -> Result<StatusCode, AppError> {
    let role: MemberRole = role
        .parse()
        .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e)))?;
    let module = parse_module(&module)?;

    state
        .permissions
        .update_role_template(&member.membership, role, module, &req.config, req.apply_to_all)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
