use service_core::axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use super::parse_module;
use crate::dtos::{ErrorResponse, PermissionsResponse};
use crate::middleware::CurrentMember;
use crate::models::{ModulePermissions, PermissionMatrix, RbacModule};
use crate::services::access_guard;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/memberships/current/permissions",
    responses(
        (status = 200, description = "Permission matrix of the caller", body = PermissionsResponse),
        (status = 401, description = "Missing request context", body = ErrorResponse),
        (status = 403, description = "Caller has no membership", body = ErrorResponse)
    ),
    tag = "Permissions"
)]
pub async fn get_current_permissions(
    State(state): State<AppState>,
    member: CurrentMember,
) -> Result<Json<PermissionsResponse>, AppError> {
    let access = state.permissions.snapshot(&member.membership).await?;

    let access_levels = RbacModule::ALL
        .into_iter()
        .map(|module| (module, access_guard::access_level(&access, module)))
        .collect();

    Ok(Json(PermissionsResponse {
        member_id: access.member_id,
        role: access.role,
        permissions: access.permissions.clone(),
        access_levels,
    }))
}

#[utoipa::path(
    put,
    path = "/memberships/{member_id}/permissions/{module}",
    params(
        ("member_id" = Uuid, Path, description = "Target membership"),
        ("module" = String, Path, description = "Module code")
    ),
    request_body = ModulePermissions,
    responses(
        (status = 200, description = "Updated permission matrix", body = PermissionMatrix),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Unknown member or module", body = ErrorResponse)
    ),
    tag = "Permissions"
)]
pub async fn put_module_permissions(
    State(state): State<AppState>,
    member: CurrentMember,
    Path((member_id, module)): Path<(Uuid, String)>,
    Json(permissions): Json<ModulePermissions>,
) -> Result<Json<PermissionMatrix>, AppError> {
    let module = parse_module(&module)?;
    let matrix = state
        .permissions
        .set_module_permissions(&member.membership, member_id, module, permissions)
        .await?;
    Ok(Json(matrix))
}
