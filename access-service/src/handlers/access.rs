use service_core::axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;

use super::parse_module;
use crate::dtos::{AccessQuery, AccessResponse, ErrorResponse};
use crate::middleware::CurrentMember;
use crate::models::RbacAction;
use crate::services::access_guard::{self, AccessDecision, AccessRequest, PermissionState};
use crate::services::metrics;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/access/{module}",
    params(
        ("module" = String, Path, description = "Module code"),
        AccessQuery
    ),
    responses(
        (status = 200, description = "Guard decision; denials are answers, not errors", body = AccessResponse),
        (status = 400, description = "Unknown action", body = ErrorResponse),
        (status = 403, description = "Caller has no membership", body = ErrorResponse),
        (status = 404, description = "Unknown module", body = ErrorResponse)
    ),
    tag = "Access"
)]
pub async fn check_access(
    State(state): State<AppState>,
    member: CurrentMember,
    Path(module): Path<String>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<AccessResponse>, AppError> {
    let module = parse_module(&module)?;
    let action = match query.action.as_deref() {
        None => RbacAction::Read,
        Some(raw) => raw
            .parse()
            .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e)))?,
    };

    let access = state.permissions.snapshot(&member.membership).await?;
    let config = state
        .config_service
        .resolve(&member.context.config_context(), false)
        .await?;

    let request = AccessRequest {
        module,
        action,
        subview: query.subview.clone(),
    };
    let decision = access_guard::check(&PermissionState::Ready(&access), Some(&config), &request);
    metrics::record_access_decision(decision.outcome());

    let (decision_label, reason) = match decision {
        AccessDecision::Allowed => ("allowed", None),
        AccessDecision::Pending => ("pending", None),
        AccessDecision::Denied(reason) => ("denied", Some(reason)),
    };

    Ok(Json(AccessResponse {
        module,
        action,
        subview: query.subview,
        allowed: decision.is_allowed(),
        decision: decision_label.to_string(),
        reason,
        read_only: access_guard::is_read_only(&access, module),
    }))
}
