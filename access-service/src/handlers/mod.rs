//! HTTP handlers for access-service.

pub mod access;
pub mod config;
pub mod health;
pub mod metrics;
pub mod module_views;
pub mod packs;
pub mod permissions;

use service_core::error::AppError;

use crate::models::RbacModule;

/// Module named in a request path.
pub(crate) fn parse_module(raw: &str) -> Result<RbacModule, AppError> {
    raw.parse()
        .map_err(|e: String| AppError::NotFound(anyhow::anyhow!(e)))
}
