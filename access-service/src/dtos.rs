//! Request and response bodies of the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    ConfigValue, MemberRole, ModuleViewConfig, PermissionMatrix, RbacAction, RbacModule,
    RegistryEntry, RegistryScope, SourceTag,
};
use crate::services::access_guard::{AccessLevel, DenyReason};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ConfigQuery {
    /// Bypass cached resolutions and the CMS snapshot.
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigKeyResponse {
    pub key: String,
    #[schema(value_type = Object)]
    pub value: ConfigValue,
    pub source: SourceTag,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistryWriteRequest {
    #[validate(length(min = 1, max = 128, message = "Key must be 1-128 characters"))]
    pub key: String,
    #[schema(value_type = Object)]
    pub value: ConfigValue,
    #[serde(default = "default_scope")]
    pub scope: RegistryScope,
    pub project_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

fn default_scope() -> RegistryScope {
    RegistryScope::Account
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntryResponse {
    pub entry_id: Uuid,
    pub key: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub value: ConfigValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl From<RegistryEntry> for RegistryEntryResponse {
    fn from(entry: RegistryEntry) -> Self {
        Self {
            entry_id: entry.entry_id,
            key: entry.config_key,
            scope: entry.scope_code,
            project_id: entry.project_id,
            user_id: entry.user_id,
            value: entry.config_value,
            updated_by: entry.updated_by,
            updated_at: entry.updated_utc,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsResponse {
    pub member_id: Uuid,
    pub role: MemberRole,
    pub permissions: PermissionMatrix,
    /// Coarse level per module, for callers that only need to pick a layout.
    pub access_levels: BTreeMap<RbacModule, AccessLevel>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleTemplateRequest {
    pub config: ModuleViewConfig,
    #[serde(default)]
    pub apply_to_all: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AccessQuery {
    /// Defaults to `read`.
    pub action: Option<String>,
    pub subview: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub module: RbacModule,
    pub action: RbacAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subview: Option<String>,
    pub allowed: bool,
    /// `allowed`, `pending` or `denied`.
    pub decision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
    pub read_only: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackApplicationResponse {
    pub member_id: Uuid,
    pub pack_id: String,
    pub pack_version: u32,
    pub permissions: PermissionMatrix,
}
