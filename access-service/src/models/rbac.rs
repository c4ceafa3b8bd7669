//! RBAC vocabulary: modules, actions and the per-membership permission matrix.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Top-level functional area of the application.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RbacModule {
    Crm,
    Projects,
    Product,
    Roadmap,
    Tasks,
    Notes,
    Documents,
    Profitability,
}

impl RbacModule {
    pub const ALL: [RbacModule; 8] = [
        RbacModule::Crm,
        RbacModule::Projects,
        RbacModule::Product,
        RbacModule::Roadmap,
        RbacModule::Tasks,
        RbacModule::Notes,
        RbacModule::Documents,
        RbacModule::Profitability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RbacModule::Crm => "crm",
            RbacModule::Projects => "projects",
            RbacModule::Product => "product",
            RbacModule::Roadmap => "roadmap",
            RbacModule::Tasks => "tasks",
            RbacModule::Notes => "notes",
            RbacModule::Documents => "documents",
            RbacModule::Profitability => "profitability",
        }
    }

    /// Config key of the feature flag gating this module, e.g. `feature_flags.crm_module`.
    pub fn feature_flag_key(&self) -> String {
        format!("feature_flags.{}_module", self.as_str())
    }
}

impl std::fmt::Display for RbacModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RbacModule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RbacModule::ALL
            .into_iter()
            .find(|m| m.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Invalid module: {}", s))
    }
}

/// Action evaluated against a module.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RbacAction {
    Read,
    Create,
    Update,
    Delete,
}

impl RbacAction {
    pub const ALL: [RbacAction; 4] = [
        RbacAction::Read,
        RbacAction::Create,
        RbacAction::Update,
        RbacAction::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RbacAction::Read => "read",
            RbacAction::Create => "create",
            RbacAction::Update => "update",
            RbacAction::Delete => "delete",
        }
    }
}

impl std::str::FromStr for RbacAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(RbacAction::Read),
            "create" => Ok(RbacAction::Create),
            "update" => Ok(RbacAction::Update),
            "delete" => Ok(RbacAction::Delete),
            _ => Err(format!("Invalid action: {}", s)),
        }
    }
}

/// Allowed actions for one module. Omitted actions deserialize as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ModulePermissions {
    pub read: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl ModulePermissions {
    pub const NONE: ModulePermissions = ModulePermissions {
        read: false,
        create: false,
        update: false,
        delete: false,
    };

    pub const READ_ONLY: ModulePermissions = ModulePermissions {
        read: true,
        create: false,
        update: false,
        delete: false,
    };

    pub const FULL: ModulePermissions = ModulePermissions {
        read: true,
        create: true,
        update: true,
        delete: true,
    };

    pub fn allows(&self, action: RbacAction) -> bool {
        match action {
            RbacAction::Read => self.read,
            RbacAction::Create => self.create,
            RbacAction::Update => self.update,
            RbacAction::Delete => self.delete,
        }
    }
}

/// Module -> allowed actions for one membership.
///
/// A module missing from the matrix denies every action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PermissionMatrix(pub BTreeMap<RbacModule, ModulePermissions>);

impl PermissionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(&self, module: RbacModule) -> Option<&ModulePermissions> {
        self.0.get(&module)
    }

    pub fn allows(&self, module: RbacModule, action: RbacAction) -> bool {
        self.0
            .get(&module)
            .map(|perms| perms.allows(action))
            .unwrap_or(false)
    }

    pub fn set(&mut self, module: RbacModule, permissions: ModulePermissions) {
        self.0.insert(module, permissions);
    }

    pub fn with(mut self, module: RbacModule, permissions: ModulePermissions) -> Self {
        self.set(module, permissions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module_codes_case_insensitively() {
        assert_eq!("CRM".parse::<RbacModule>().unwrap(), RbacModule::Crm);
        assert_eq!(
            "profitability".parse::<RbacModule>().unwrap(),
            RbacModule::Profitability
        );
        assert!("billing".parse::<RbacModule>().is_err());
    }

    #[test]
    fn feature_flag_key_follows_module_code() {
        assert_eq!(RbacModule::Crm.feature_flag_key(), "feature_flags.crm_module");
    }

    #[test]
    fn omitted_actions_deserialize_as_denied() {
        let perms: ModulePermissions = serde_json::from_str(r#"{"read": true}"#).unwrap();
        assert_eq!(perms, ModulePermissions::READ_ONLY);
    }

    #[test]
    fn matrix_serializes_with_module_codes_as_keys() {
        let matrix = PermissionMatrix::new().with(RbacModule::Crm, ModulePermissions::READ_ONLY);
        let json = serde_json::to_value(&matrix).unwrap();
        assert_eq!(json["crm"]["read"], true);
        assert_eq!(json["crm"]["delete"], false);
    }

    #[test]
    fn missing_module_denies() {
        let matrix = PermissionMatrix::new().with(RbacModule::Crm, ModulePermissions::FULL);
        assert!(!matrix.allows(RbacModule::Projects, RbacAction::Read));
    }
}
