//! Per-module subview visibility records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Subview visibility and optional layout for one module.
///
/// A subview absent from `subviews_enabled` is visible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleViewConfig {
    #[serde(default)]
    pub subviews_enabled: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub layout: Option<serde_json::Value>,
}

impl ModuleViewConfig {
    pub fn with_subviews<I, S>(subviews: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        Self {
            subviews_enabled: subviews.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            layout: None,
        }
    }

    pub fn is_enabled(&self, subview_key: &str) -> bool {
        self.subviews_enabled
            .get(subview_key)
            .copied()
            .unwrap_or(true)
    }
}

/// Organization-level template row for (role, module).
#[derive(Debug, Clone, FromRow)]
pub struct RoleViewTemplate {
    pub organization_id: Uuid,
    pub role_code: String,
    pub module_code: String,
    pub subviews_enabled: Json<BTreeMap<String, bool>>,
    pub layout: Option<Json<serde_json::Value>>,
    pub updated_utc: DateTime<Utc>,
}

impl From<RoleViewTemplate> for ModuleViewConfig {
    fn from(row: RoleViewTemplate) -> Self {
        Self {
            subviews_enabled: row.subviews_enabled.0,
            layout: row.layout.map(|l| l.0),
        }
    }
}

/// Member-level override row, written when a permission pack is applied.
#[derive(Debug, Clone, FromRow)]
pub struct MemberViewOverride {
    pub member_id: Uuid,
    pub module_code: String,
    pub subviews_enabled: Json<BTreeMap<String, bool>>,
    pub updated_utc: DateTime<Utc>,
}
