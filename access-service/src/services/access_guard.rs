//! Access guard: the one place permission, subview visibility and feature
//! flags are combined into an allow/deny answer.
//!
//! Defaults are deliberately asymmetric:
//! - permissions fail closed (missing module or action denies),
//! - subviews fail open (missing config or key is visible),
//! - admins bypass both.

use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use super::config_resolver::ResolvedConfig;
use crate::models::{MemberRole, ModuleViewConfig, PermissionMatrix, RbacAction, RbacModule};

/// Everything the guard needs to know about one membership.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MembershipAccess {
    pub member_id: Uuid,
    pub role: MemberRole,
    pub permissions: PermissionMatrix,
    /// Effective view config per module; modules without one are absent.
    #[serde(skip)]
    pub views: BTreeMap<RbacModule, ModuleViewConfig>,
}

impl MembershipAccess {
    pub fn new(member_id: Uuid, role: MemberRole, permissions: PermissionMatrix) -> Self {
        Self {
            member_id,
            role,
            permissions,
            views: BTreeMap::new(),
        }
    }

    pub fn with_view(mut self, module: RbacModule, view: ModuleViewConfig) -> Self {
        self.views.insert(module, view);
        self
    }
}

/// Permission data as seen by a caller that may still be loading it.
#[derive(Debug, Clone)]
pub enum PermissionState<'a> {
    Pending,
    Ready(&'a MembershipAccess),
}

/// Coarse access level for a module. Distinguishes "no access" from "read-only".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Full,
    ReadWrite,
    ReadOnly,
    NoAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    FeatureDisabled,
    AccessDenied,
    SubviewUnavailable,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::FeatureDisabled => "feature_disabled",
            DenyReason::AccessDenied => "access_denied",
            DenyReason::SubviewUnavailable => "subview_unavailable",
        }
    }
}

/// Outcome of a guarded check. `Pending` means "render nothing yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum AccessDecision {
    Allowed,
    Pending,
    Denied(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            AccessDecision::Allowed => "allowed",
            AccessDecision::Pending => "pending",
            AccessDecision::Denied(reason) => reason.as_str(),
        }
    }
}

pub fn can(access: &MembershipAccess, module: RbacModule, action: RbacAction) -> bool {
    if access.role.is_admin() {
        return true;
    }
    access.permissions.allows(module, action)
}

/// Read allowed, every write denied, and not an admin.
pub fn is_read_only(access: &MembershipAccess, module: RbacModule) -> bool {
    !access.role.is_admin()
        && can(access, module, RbacAction::Read)
        && !can(access, module, RbacAction::Create)
        && !can(access, module, RbacAction::Update)
        && !can(access, module, RbacAction::Delete)
}

pub fn access_level(access: &MembershipAccess, module: RbacModule) -> AccessLevel {
    let allowed: Vec<bool> = RbacAction::ALL
        .iter()
        .map(|action| can(access, module, *action))
        .collect();
    match allowed.as_slice() {
        [true, true, true, true] => AccessLevel::Full,
        [true, false, false, false] => AccessLevel::ReadOnly,
        [true, ..] => AccessLevel::ReadWrite,
        _ => AccessLevel::NoAccess,
    }
}

pub fn is_subview_enabled(access: &MembershipAccess, module: RbacModule, subview_key: &str) -> bool {
    if access.role.is_admin() {
        return true;
    }
    access
        .views
        .get(&module)
        .map(|view| view.is_enabled(subview_key))
        .unwrap_or(true)
}

/// Question asked of the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub module: RbacModule,
    pub action: RbacAction,
    pub subview: Option<String>,
}

impl AccessRequest {
    pub fn view(module: RbacModule) -> Self {
        Self {
            module,
            action: RbacAction::Read,
            subview: None,
        }
    }

    pub fn subview(module: RbacModule, subview: impl Into<String>) -> Self {
        Self {
            module,
            action: RbacAction::Read,
            subview: Some(subview.into()),
        }
    }
}

/// Evaluate, in order: data loaded, feature flag, read permission, requested
/// action, subview visibility. The first failing step decides.
pub fn check(
    permissions: &PermissionState<'_>,
    config: Option<&ResolvedConfig>,
    request: &AccessRequest,
) -> AccessDecision {
    let (PermissionState::Ready(access), Some(config)) = (permissions, config) else {
        return AccessDecision::Pending;
    };

    if !config.flag(&request.module.feature_flag_key()) {
        return AccessDecision::Denied(DenyReason::FeatureDisabled);
    }

    if !can(access, request.module, RbacAction::Read)
        || !can(access, request.module, request.action)
    {
        return AccessDecision::Denied(DenyReason::AccessDenied);
    }

    if let Some(subview) = &request.subview {
        if !is_subview_enabled(access, request.module, subview) {
            return AccessDecision::Denied(DenyReason::SubviewUnavailable);
        }
    }

    AccessDecision::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults;
    use crate::models::{ConfigContext, ConfigKey, ModulePermissions, RegistryEntry};
    use crate::services::config_resolver::{resolve, CmsLayer};
    use chrono::Utc;
    use serde_json::json;

    fn member(role: MemberRole, permissions: PermissionMatrix) -> MembershipAccess {
        MembershipAccess::new(Uuid::new_v4(), role, permissions)
    }

    fn crm_read_only_member() -> MembershipAccess {
        member(
            MemberRole::Member,
            PermissionMatrix::new().with(RbacModule::Crm, ModulePermissions::READ_ONLY),
        )
    }

    fn config_with(registry: Vec<RegistryEntry>, account_id: Uuid) -> ResolvedConfig {
        resolve(
            defaults::builtin(),
            &CmsLayer::Unavailable,
            &registry,
            &ConfigContext::account(account_id),
            Utc::now(),
        )
    }

    #[test]
    fn crm_read_only_member_scenario() {
        let access = crm_read_only_member();
        assert!(can(&access, RbacModule::Crm, RbacAction::Read));
        assert!(!can(&access, RbacModule::Crm, RbacAction::Create));
        assert!(is_read_only(&access, RbacModule::Crm));
        assert!(!can(&access, RbacModule::Projects, RbacAction::Read));
    }

    #[test]
    fn absent_modules_deny_every_action() {
        let access = crm_read_only_member();
        for module in RbacModule::ALL.into_iter().filter(|m| *m != RbacModule::Crm) {
            for action in RbacAction::ALL {
                assert!(!can(&access, module, action), "{module}/{action:?}");
            }
        }
    }

    #[test]
    fn admin_can_everything_regardless_of_matrix() {
        let access = member(MemberRole::Admin, PermissionMatrix::new())
            .with_view(RbacModule::Crm, ModuleViewConfig::with_subviews([("pipeline", false)]));
        for module in RbacModule::ALL {
            for action in RbacAction::ALL {
                assert!(can(&access, module, action));
            }
            assert!(!is_read_only(&access, module));
        }
        assert!(is_subview_enabled(&access, RbacModule::Crm, "pipeline"));
    }

    #[test]
    fn read_only_matches_formula() {
        let cases = [
            (ModulePermissions::READ_ONLY, true),
            (ModulePermissions::FULL, false),
            (ModulePermissions::NONE, false),
            (
                ModulePermissions {
                    read: true,
                    update: true,
                    ..ModulePermissions::NONE
                },
                false,
            ),
        ];
        for (perms, expected) in cases {
            let access = member(
                MemberRole::Member,
                PermissionMatrix::new().with(RbacModule::Notes, perms),
            );
            assert_eq!(is_read_only(&access, RbacModule::Notes), expected, "{perms:?}");
        }
    }

    #[test]
    fn access_level_distinguishes_no_access_from_read_only() {
        let access = crm_read_only_member();
        assert_eq!(access_level(&access, RbacModule::Crm), AccessLevel::ReadOnly);
        assert_eq!(access_level(&access, RbacModule::Tasks), AccessLevel::NoAccess);

        let admin = member(MemberRole::Admin, PermissionMatrix::new());
        assert_eq!(access_level(&admin, RbacModule::Tasks), AccessLevel::Full);
    }

    #[test]
    fn subviews_fail_open() {
        let access = crm_read_only_member()
            .with_view(RbacModule::Crm, ModuleViewConfig::with_subviews([("companies", false)]));

        assert!(!is_subview_enabled(&access, RbacModule::Crm, "companies"));
        assert!(is_subview_enabled(&access, RbacModule::Crm, "pipeline"));
        assert!(is_subview_enabled(&access, RbacModule::Projects, "budget"));
    }

    #[test]
    fn pending_data_yields_pending_decision() {
        let access = crm_read_only_member();
        let config = config_with(vec![], Uuid::new_v4());
        let request = AccessRequest::view(RbacModule::Crm);

        assert_eq!(check(&PermissionState::Pending, Some(&config), &request), AccessDecision::Pending);
        assert_eq!(check(&PermissionState::Ready(&access), None, &request), AccessDecision::Pending);
        assert_eq!(
            check(&PermissionState::Ready(&access), Some(&config), &request),
            AccessDecision::Allowed
        );
    }

    #[test]
    fn disabled_feature_denies_even_admins() {
        let account_id = Uuid::new_v4();
        let flag = ConfigKey::parse("feature_flags.crm_module").unwrap();
        let config = config_with(
            vec![RegistryEntry::account(account_id, &flag, json!(false))],
            account_id,
        );
        let admin = member(MemberRole::Admin, PermissionMatrix::new());

        assert_eq!(
            check(&PermissionState::Ready(&admin), Some(&config), &AccessRequest::view(RbacModule::Crm)),
            AccessDecision::Denied(DenyReason::FeatureDisabled)
        );
    }

    #[test]
    fn non_boolean_flag_counts_as_disabled() {
        let account_id = Uuid::new_v4();
        let flag = ConfigKey::parse("feature_flags.notes_module").unwrap();
        let config = config_with(
            vec![RegistryEntry::account(account_id, &flag, json!("yes"))],
            account_id,
        );
        let admin = member(MemberRole::Admin, PermissionMatrix::new());

        assert_eq!(
            check(&PermissionState::Ready(&admin), Some(&config), &AccessRequest::view(RbacModule::Notes)),
            AccessDecision::Denied(DenyReason::FeatureDisabled)
        );
    }

    #[test]
    fn missing_read_is_access_denied_before_subview_check() {
        let access = crm_read_only_member()
            .with_view(RbacModule::Projects, ModuleViewConfig::with_subviews([("budget", false)]));
        let config = config_with(vec![], Uuid::new_v4());

        assert_eq!(
            check(
                &PermissionState::Ready(&access),
                Some(&config),
                &AccessRequest::subview(RbacModule::Projects, "budget")
            ),
            AccessDecision::Denied(DenyReason::AccessDenied)
        );
    }

    #[test]
    fn hidden_subview_has_distinct_reason() {
        let access = crm_read_only_member()
            .with_view(RbacModule::Crm, ModuleViewConfig::with_subviews([("companies", false)]));
        let config = config_with(vec![], Uuid::new_v4());
        let ready = PermissionState::Ready(&access);

        assert_eq!(
            check(&ready, Some(&config), &AccessRequest::subview(RbacModule::Crm, "companies")),
            AccessDecision::Denied(DenyReason::SubviewUnavailable)
        );
        assert_eq!(
            check(&ready, Some(&config), &AccessRequest::subview(RbacModule::Crm, "pipeline")),
            AccessDecision::Allowed
        );
    }

    #[test]
    fn write_actions_need_their_own_permission() {
        let access = crm_read_only_member();
        let config = config_with(vec![], Uuid::new_v4());
        let request = AccessRequest {
            module: RbacModule::Crm,
            action: RbacAction::Update,
            subview: None,
        };

        assert_eq!(
            check(&PermissionState::Ready(&access), Some(&config), &request),
            AccessDecision::Denied(DenyReason::AccessDenied)
        );
    }

    #[test]
    fn decision_serializes_with_reason() {
        let json = serde_json::to_value(AccessDecision::Denied(DenyReason::SubviewUnavailable)).unwrap();
        assert_eq!(json, json!({ "decision": "denied", "reason": "subview_unavailable" }));
        let json = serde_json::to_value(AccessDecision::Allowed).unwrap();
        assert_eq!(json, json!({ "decision": "allowed" }));
    }
}
