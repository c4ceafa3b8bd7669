//! Configuration keys, values and registry store rows.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Payload stored under a config key: primitive, array or object.
pub type ConfigValue = serde_json::Value;

static CONFIG_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_]+(\.[a-z0-9_]+)*$").unwrap_or_else(|e| panic!("invalid pattern: {e}"))
});

pub const CONFIG_KEY_MAX_LEN: usize = 128;

/// Dot-namespaced configuration key, e.g. `project.stages`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigKey(String);

impl ConfigKey {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.len() > CONFIG_KEY_MAX_LEN {
            return Err(format!(
                "Config key must be at most {} characters",
                CONFIG_KEY_MAX_LEN
            ));
        }
        if !CONFIG_KEY_PATTERN.is_match(raw) {
            return Err(format!("Invalid config key: {}", raw));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ConfigKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ConfigKey::parse(&value)
    }
}

impl From<ConfigKey> for String {
    fn from(key: ConfigKey) -> Self {
        key.0
    }
}

/// Layer that produced a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Default,
    Strapi,
    Db,
}

/// Registry override scope, ordered from least to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistryScope {
    Account,
    Project,
    User,
}

impl RegistryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryScope::Account => "account",
            RegistryScope::Project => "project",
            RegistryScope::User => "user",
        }
    }
}

impl std::str::FromStr for RegistryScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "account" => Ok(RegistryScope::Account),
            "project" => Ok(RegistryScope::Project),
            "user" => Ok(RegistryScope::User),
            _ => Err(format!("Invalid registry scope: {}", s)),
        }
    }
}

/// Context a configuration is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigContext {
    pub account_id: Uuid,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

impl ConfigContext {
    pub fn account(account_id: Uuid) -> Self {
        Self {
            account_id,
            user_id: None,
            project_id: None,
        }
    }
}

/// Registry store row: an override for one key at one scope.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RegistryEntry {
    pub entry_id: Uuid,
    pub account_id: Uuid,
    pub scope_code: String,
    pub project_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub config_key: String,
    pub config_value: ConfigValue,
    pub updated_by: Option<Uuid>,
    pub updated_utc: DateTime<Utc>,
}

impl RegistryEntry {
    pub fn account(account_id: Uuid, key: &ConfigKey, value: ConfigValue) -> Self {
        Self::new(account_id, RegistryScope::Account, None, None, key, value)
    }

    pub fn new(
        account_id: Uuid,
        scope: RegistryScope,
        project_id: Option<Uuid>,
        user_id: Option<Uuid>,
        key: &ConfigKey,
        value: ConfigValue,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            account_id,
            scope_code: scope.as_str().to_string(),
            project_id,
            user_id,
            config_key: key.as_str().to_string(),
            config_value: value,
            updated_by: None,
            updated_utc: Utc::now(),
        }
    }

    pub fn scope(&self) -> Option<RegistryScope> {
        self.scope_code.parse().ok()
    }

    /// Whether this override targets `ctx`. Rows with an unknown scope never apply.
    pub fn applies_to(&self, ctx: &ConfigContext) -> bool {
        if self.account_id != ctx.account_id {
            return false;
        }
        match self.scope() {
            Some(RegistryScope::Account) => true,
            Some(RegistryScope::Project) => {
                self.project_id.is_some() && self.project_id == ctx.project_id
            }
            Some(RegistryScope::User) => self.user_id.is_some() && self.user_id == ctx.user_id,
            None => false,
        }
    }

    /// Identity of the slot this row occupies; a later write to the same slot supersedes it.
    pub fn slot(&self) -> (Uuid, &str, Option<Uuid>, Option<Uuid>, &str) {
        (
            self.account_id,
            self.scope_code.as_str(),
            self.project_id,
            self.user_id,
            self.config_key.as_str(),
        )
    }
}
