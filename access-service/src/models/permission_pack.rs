//! Permission pack model: a named bundle of module permissions and subview defaults.

use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::{ModulePermissions, RbacModule};

/// What a pack grants for a single module.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackModule {
    pub actions: ModulePermissions,
    pub default_subviews: BTreeMap<String, bool>,
}

/// Catalogue entry. Applying a pack replaces the covered modules wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionPack {
    pub pack_id: String,
    pub version: u32,
    pub label: String,
    pub description: String,
    pub modules: BTreeMap<RbacModule, PackModule>,
}
