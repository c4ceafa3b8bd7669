use service_core::axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

use super::context::CurrentMember;
use crate::AppState;

/// Resolve the caller's membership and reject anyone who is not an admin.
///
/// The resolved [`CurrentMember`] is stored in request extensions for handlers.
pub async fn admin_member_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let member = match CurrentMember::from_request_parts(&mut parts, &state).await {
        Ok(member) => member,
        Err(e) => return e.into_response(),
    };

    if !member.membership.is_admin() {
        tracing::warn!(
            account_id = %member.context.account_id,
            user_id = %member.context.user_id,
            path = %parts.uri.path(),
            "Non-admin attempted an administrative write"
        );
        return AppError::Forbidden(anyhow::anyhow!("Admin role required")).into_response();
    }

    parts.extensions.insert(member);
    next.run(Request::from_parts(parts, body)).await
}
