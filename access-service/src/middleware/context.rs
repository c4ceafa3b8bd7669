//! Request context supplied by the trusted gateway.
//!
//! The identity provider is upstream: by the time a request arrives here the
//! gateway has authenticated the caller and stamped these headers.

use service_core::{
    axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap},
    error::AppError,
};
use uuid::Uuid;

use crate::models::{ConfigContext, Membership};
use crate::AppState;

pub const ACCOUNT_ID_HEADER: &str = "x-account-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const PROJECT_ID_HEADER: &str = "x-project-id";

/// Account, user and optional project of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let account_id = required_uuid(headers, ACCOUNT_ID_HEADER)?;
        let user_id = required_uuid(headers, USER_ID_HEADER)?;
        let project_id = match headers.get(PROJECT_ID_HEADER) {
            None => None,
            Some(value) => Some(
                value
                    .to_str()
                    .ok()
                    .and_then(|v| Uuid::parse_str(v.trim()).ok())
                    .ok_or_else(|| {
                        AppError::BadRequest(anyhow::anyhow!("Invalid {} header", PROJECT_ID_HEADER))
                    })?,
            ),
        };
        Ok(Self {
            account_id,
            user_id,
            project_id,
        })
    }

    pub fn config_context(&self) -> ConfigContext {
        ConfigContext {
            account_id: self.account_id,
            user_id: Some(self.user_id),
            project_id: self.project_id,
        }
    }
}

fn required_uuid(headers: &HeaderMap, name: &str) -> Result<Uuid, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing or invalid {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<RequestContext>() {
            return Ok(*ctx);
        }
        RequestContext::from_headers(&parts.headers)
    }
}

/// The caller's membership in the account named by the request context.
#[derive(Debug, Clone)]
pub struct CurrentMember {
    pub context: RequestContext,
    pub membership: Membership,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentMember {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(member) = parts.extensions.get::<CurrentMember>() {
            return Ok(member.clone());
        }
        let context = RequestContext::from_request_parts(parts, state).await?;
        let membership = state
            .permissions
            .current_membership(context.account_id, context.user_id)
            .await?;
        Ok(Self {
            context,
            membership,
        })
    }
}
