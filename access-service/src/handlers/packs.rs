use service_core::axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::defaults::packs;
use crate::dtos::{ErrorResponse, PackApplicationResponse};
use crate::middleware::CurrentMember;
use crate::models::PermissionPack;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/permission-packs",
    responses(
        (status = 200, description = "Pack catalogue", body = [PermissionPack])
    ),
    tag = "Permission Packs"
)]
pub async fn list_packs() -> Json<Vec<PermissionPack>> {
    Json(packs::catalog().to_vec())
}

#[utoipa::path(
    post,
    path = "/memberships/{member_id}/permission-packs/{pack_id}",
    params(
        ("member_id" = Uuid, Path, description = "Target membership"),
        ("pack_id" = String, Path, description = "Pack identifier")
    ),
    responses(
        (status = 200, description = "Pack applied", body = PackApplicationResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Unknown pack or member; nothing written", body = ErrorResponse)
    ),
    tag = "Permission Packs"
)]
pub async fn apply_pack(
    State(state): State<AppState>,
    member: CurrentMember,
    Path((member_id, pack_id)): Path<(Uuid, String)>,
) -> Result<Json<PackApplicationResponse>, AppError> {
    let (pack, permissions) = state
        .permissions
        .apply_pack(&member.membership, member_id, &pack_id)
        .await?;

    Ok(Json(PackApplicationResponse {
        member_id,
        pack_id: pack.pack_id.clone(),
        pack_version: pack.version,
        permissions,
    }))
}
