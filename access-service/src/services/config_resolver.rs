//! Layered configuration resolution.
//!
//! Precedence, lowest to highest:
//! 1. compiled-in defaults
//! 2. CMS values, when the CMS answered
//! 3. registry store overrides (account < project < user)
//!
//! The highest layer defining a key wins outright. Arrays and objects are
//! replaced whole; values are never deep-merged.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::defaults::DefaultTable;
use crate::models::{ConfigContext, ConfigKey, ConfigValue, RegistryEntry, SourceTag};

/// Snapshot of the CMS tier for one resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum CmsLayer {
    Available(HashMap<ConfigKey, ConfigValue>),
    Unavailable,
}

impl CmsLayer {
    pub fn is_available(&self) -> bool {
        matches!(self, CmsLayer::Available(_))
    }

    fn get(&self, key: &ConfigKey) -> Option<&ConfigValue> {
        match self {
            CmsLayer::Available(values) => values.get(key),
            CmsLayer::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSource {
    pub source: SourceTag,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionMeta {
    pub resolved_at: DateTime<Utc>,
    pub account_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    /// Whether the CMS tier took part in this resolution.
    pub strapi_available: bool,
}

/// Effective configuration for one context, with the winning layer of every key.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResolvedConfig {
    #[schema(value_type = Object)]
    pub effective: BTreeMap<ConfigKey, ConfigValue>,
    pub sources: BTreeMap<ConfigKey, ResolvedSource>,
    pub meta: ResolutionMeta,
}

impl ResolvedConfig {
    /// Unknown keys yield `None`.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        let key = ConfigKey::parse(key).ok()?;
        self.effective.get(&key)
    }

    pub fn source_of(&self, key: &str) -> Option<SourceTag> {
        let key = ConfigKey::parse(key).ok()?;
        self.sources.get(&key).map(|s| s.source)
    }

    /// Boolean flag lookup; absent or non-boolean values read as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(ConfigValue::as_bool).unwrap_or(false)
    }
}

/// Pick the registry override for each key that applies to `ctx`, most specific scope first.
///
/// Ties within the same scope go to the most recently updated row.
fn registry_layer<'a>(
    entries: &'a [RegistryEntry],
    ctx: &ConfigContext,
) -> HashMap<ConfigKey, &'a RegistryEntry> {
    let mut winners: HashMap<ConfigKey, &RegistryEntry> = HashMap::new();

    for entry in entries.iter().filter(|e| e.applies_to(ctx)) {
        let Ok(key) = ConfigKey::parse(&entry.config_key) else {
            tracing::warn!(
                entry_id = %entry.entry_id,
                config_key = %entry.config_key,
                "Skipping registry entry with malformed key"
            );
            continue;
        };

        let replace = match winners.get(&key) {
            None => true,
            Some(current) => {
                (entry.scope(), entry.updated_utc) > (current.scope(), current.updated_utc)
            }
        };
        if replace {
            winners.insert(key, entry);
        }
    }

    winners
}

/// Merge the three layers for `ctx`. Pure: same inputs, same output.
pub fn resolve(
    defaults: &DefaultTable,
    cms: &CmsLayer,
    registry: &[RegistryEntry],
    ctx: &ConfigContext,
    now: DateTime<Utc>,
) -> ResolvedConfig {
    let mut effective = BTreeMap::new();
    let mut sources = BTreeMap::new();

    let mut record = |key: ConfigKey, value: ConfigValue, source: SourceTag| {
        sources.insert(
            key.clone(),
            ResolvedSource {
                source,
                resolved_at: now,
            },
        );
        effective.insert(key, value);
    };

    for (key, value) in defaults.iter() {
        record(key.clone(), value.clone(), SourceTag::Default);
    }

    if let CmsLayer::Available(values) = cms {
        for (key, value) in values {
            record(key.clone(), value.clone(), SourceTag::Strapi);
        }
    }

    for (key, entry) in registry_layer(registry, ctx) {
        record(key, entry.config_value.clone(), SourceTag::Db);
    }

    ResolvedConfig {
        effective,
        sources,
        meta: ResolutionMeta {
            resolved_at: now,
            account_id: ctx.account_id,
            user_id: ctx.user_id,
            project_id: ctx.project_id,
            strapi_available: cms.is_available(),
        },
    }
}

/// Resolve a single key without materialising the whole map.
pub fn resolve_key(
    key: &ConfigKey,
    defaults: &DefaultTable,
    cms: &CmsLayer,
    registry: &[RegistryEntry],
    ctx: &ConfigContext,
) -> Option<(ConfigValue, SourceTag)> {
    if let Some(entry) = registry_layer(registry, ctx).get(key) {
        return Some((entry.config_value.clone(), SourceTag::Db));
    }
    if let Some(value) = cms.get(key) {
        return Some((value.clone(), SourceTag::Strapi));
    }
    defaults
        .get(key)
        .map(|value| (value.clone(), SourceTag::Default))
}
