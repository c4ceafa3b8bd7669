//! Services layer for access-service.
//!
//! Pure resolution and guard logic lives in `config_resolver`, `access_guard`
//! and `permission_packs`; the `*_service` types fetch data and own the caches.

pub mod access_guard;
pub mod cache;
pub mod cms;
pub mod config_resolver;
mod config_service;
mod database;
pub mod error;
pub mod metrics;
pub mod permission_packs;
mod permission_service;
pub mod store;

pub use access_guard::{AccessDecision, AccessRequest, DenyReason, MembershipAccess, PermissionState};
pub use cms::{CachedCms, CmsSource, DisabledCms, MockCms, StrapiClient};
pub use config_resolver::{CmsLayer, ResolvedConfig};
pub use config_service::{ConfigService, RegistryWrite};
pub use database::Database;
pub use error::ServiceError;
pub use permission_service::PermissionService;
pub use store::{AccessStore, MockStore, RegistrySlot};
