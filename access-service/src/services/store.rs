//! Persistence seam for registry overrides, memberships, permissions and views.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::error::ServiceError;
use super::permission_packs::{apply_pack, PackTarget, SubviewOverrides};
use crate::models::{
    ConfigKey, MemberRole, Membership, ModulePermissions, ModuleViewConfig, PermissionMatrix,
    PermissionPack, RbacModule, RegistryEntry, RegistryScope,
};

/// Identifies one registry slot: a later write to the same slot supersedes the earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySlot {
    pub account_id: Uuid,
    pub scope: RegistryScope,
    pub project_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub key: ConfigKey,
}

impl RegistrySlot {
    fn matches(&self, entry: &RegistryEntry) -> bool {
        entry.slot()
            == (
                self.account_id,
                self.scope.as_str(),
                self.project_id,
                self.user_id,
                self.key.as_str(),
            )
    }
}

#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    /// Every registry row of an account, across all scopes.
    async fn list_registry_entries(&self, account_id: Uuid)
        -> Result<Vec<RegistryEntry>, ServiceError>;

    /// Insert or supersede the row occupying the entry's slot.
    async fn upsert_registry_entry(&self, entry: &RegistryEntry)
        -> Result<RegistryEntry, ServiceError>;

    /// Returns whether a row was removed.
    async fn remove_registry_entry(&self, slot: &RegistrySlot) -> Result<bool, ServiceError>;

    async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, ServiceError>;

    async fn find_membership_by_id(&self, member_id: Uuid)
        -> Result<Option<Membership>, ServiceError>;

    async fn insert_membership(&self, membership: &Membership) -> Result<(), ServiceError>;

    /// Stored matrix; modules without a row are absent.
    async fn get_permission_matrix(&self, member_id: Uuid)
        -> Result<PermissionMatrix, ServiceError>;

    async fn set_module_permissions(
        &self,
        member_id: Uuid,
        module: RbacModule,
        permissions: ModulePermissions,
    ) -> Result<(), ServiceError>;

    async fn get_role_view_template(
        &self,
        organization_id: Uuid,
        role: MemberRole,
        module: RbacModule,
    ) -> Result<Option<ModuleViewConfig>, ServiceError>;

    /// Write the organization template. With `apply_to_all`, member overrides
    /// of that role for the module are cleared as well.
    async fn upsert_role_view_template(
        &self,
        organization_id: Uuid,
        role: MemberRole,
        module: RbacModule,
        config: &ModuleViewConfig,
        apply_to_all: bool,
    ) -> Result<(), ServiceError>;

    /// Only `subviews_enabled` of the override is meaningful.
    async fn get_member_view_override(
        &self,
        member_id: Uuid,
        module: RbacModule,
    ) -> Result<Option<ModuleViewConfig>, ServiceError>;

    /// Overwrite every module the pack covers, atomically.
    async fn apply_pack_entries(
        &self,
        member_id: Uuid,
        pack: &PermissionPack,
    ) -> Result<(), ServiceError>;
}

#[derive(Default)]
struct MockState {
    registry: Vec<RegistryEntry>,
    memberships: HashMap<Uuid, Membership>,
    permissions: HashMap<Uuid, PermissionMatrix>,
    role_templates: HashMap<(Uuid, MemberRole, RbacModule), ModuleViewConfig>,
    member_overrides: HashMap<Uuid, SubviewOverrides>,
}

/// In-process store for tests and local development.
pub struct MockStore {
    state: Mutex<MockState>,
    healthy: AtomicBool,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn state(&self) -> Result<MutexGuard<'_, MockState>, ServiceError> {
        self.state
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl AccessStore for MockStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ServiceError::Database(sqlx::Error::PoolClosed))
        }
    }

    async fn list_registry_entries(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<RegistryEntry>, ServiceError> {
        Ok(self
            .state()?
            .registry
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn upsert_registry_entry(
        &self,
        entry: &RegistryEntry,
    ) -> Result<RegistryEntry, ServiceError> {
        let mut state = self.state()?;
        if let Some(existing) = state.registry.iter_mut().find(|e| e.slot() == entry.slot()) {
            existing.config_value = entry.config_value.clone();
            existing.updated_by = entry.updated_by;
            existing.updated_utc = entry.updated_utc;
            return Ok(existing.clone());
        }
        state.registry.push(entry.clone());
        Ok(entry.clone())
    }

    async fn remove_registry_entry(&self, slot: &RegistrySlot) -> Result<bool, ServiceError> {
        let mut state = self.state()?;
        let before = state.registry.len();
        state.registry.retain(|e| !slot.matches(e));
        Ok(state.registry.len() != before)
    }

    async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, ServiceError> {
        Ok(self
            .state()?
            .memberships
            .values()
            .find(|m| m.organization_id == organization_id && m.user_id == user_id)
            .cloned())
    }

    async fn find_membership_by_id(
        &self,
        member_id: Uuid,
    ) -> Result<Option<Membership>, ServiceError> {
        Ok(self.state()?.memberships.get(&member_id).cloned())
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), ServiceError> {
        self.state()?
            .memberships
            .insert(membership.member_id, membership.clone());
        Ok(())
    }

    async fn get_permission_matrix(
        &self,
        member_id: Uuid,
    ) -> Result<PermissionMatrix, ServiceError> {
        Ok(self
            .state()?
            .permissions
            .get(&member_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_module_permissions(
        &self,
        member_id: Uuid,
        module: RbacModule,
        permissions: ModulePermissions,
    ) -> Result<(), ServiceError> {
        self.state()?
            .permissions
            .entry(member_id)
            .or_default()
            .set(module, permissions);
        Ok(())
    }

    async fn get_role_view_template(
        &self,
        organization_id: Uuid,
        role: MemberRole,
        module: RbacModule,
    ) -> Result<Option<ModuleViewConfig>, ServiceError> {
        Ok(self
            .state()?
            .role_templates
            .get(&(organization_id, role, module))
            .cloned())
    }

    async fn upsert_role_view_template(
        &self,
        organization_id: Uuid,
        role: MemberRole,
        module: RbacModule,
        config: &ModuleViewConfig,
        apply_to_all: bool,
    ) -> Result<(), ServiceError> {
        let mut state = self.state()?;
        state
            .role_templates
            .insert((organization_id, role, module), config.clone());

        if apply_to_all {
            let affected: Vec<Uuid> = state
                .memberships
                .values()
                .filter(|m| m.organization_id == organization_id && m.role() == role)
                .map(|m| m.member_id)
                .collect();
            for member_id in affected {
                if let Some(overrides) = state.member_overrides.get_mut(&member_id) {
                    overrides.remove(&module);
                }
            }
        }
        Ok(())
    }

    async fn get_member_view_override(
        &self,
        member_id: Uuid,
        module: RbacModule,
    ) -> Result<Option<ModuleViewConfig>, ServiceError> {
        Ok(self
            .state()?
            .member_overrides
            .get(&member_id)
            .and_then(|overrides| overrides.get(&module))
            .map(|subviews| ModuleViewConfig::with_subviews(subviews.clone())))
    }

    async fn apply_pack_entries(
        &self,
        member_id: Uuid,
        pack: &PermissionPack,
    ) -> Result<(), ServiceError> {
        let mut state = self.state()?;
        let current = PackTarget {
            permissions: state.permissions.get(&member_id).cloned().unwrap_or_default(),
            subviews: state
                .member_overrides
                .get(&member_id)
                .cloned()
                .unwrap_or_default(),
        };
        let next = apply_pack(pack, &current);
        state.permissions.insert(member_id, next.permissions);
        state.member_overrides.insert(member_id, next.subviews);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::packs;
    use serde_json::json;

    fn key(raw: &str) -> ConfigKey {
        ConfigKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn upsert_supersedes_same_slot() {
        let store = MockStore::new();
        let account_id = Uuid::new_v4();
        store
            .upsert_registry_entry(&RegistryEntry::account(account_id, &key("project.stages"), json!(["a"])))
            .await
            .unwrap();
        store
            .upsert_registry_entry(&RegistryEntry::account(account_id, &key("project.stages"), json!(["b"])))
            .await
            .unwrap();

        let entries = store.list_registry_entries(account_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].config_value, json!(["b"]));
    }

    #[tokio::test]
    async fn remove_only_touches_matching_slot() {
        let store = MockStore::new();
        let account_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let stages = key("project.stages");
        store
            .upsert_registry_entry(&RegistryEntry::account(account_id, &stages, json!(["a"])))
            .await
            .unwrap();
        store
            .upsert_registry_entry(&RegistryEntry::new(
                account_id,
                RegistryScope::User,
                None,
                Some(user_id),
                &stages,
                json!(["u"]),
            ))
            .await
            .unwrap();

        let slot = RegistrySlot {
            account_id,
            scope: RegistryScope::Account,
            project_id: None,
            user_id: None,
            key: stages,
        };
        assert!(store.remove_registry_entry(&slot).await.unwrap());
        assert!(!store.remove_registry_entry(&slot).await.unwrap());

        let entries = store.list_registry_entries(account_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].scope(), Some(RegistryScope::User));
    }

    #[tokio::test]
    async fn apply_to_all_clears_overrides_for_role() {
        let store = MockStore::new();
        let org = Uuid::new_v4();
        let member = Membership::new(org, Uuid::new_v4(), MemberRole::Member);
        let guest = Membership::new(org, Uuid::new_v4(), MemberRole::Guest);
        store.insert_membership(&member).await.unwrap();
        store.insert_membership(&guest).await.unwrap();

        let pack = packs::find("sales").unwrap();
        store.apply_pack_entries(member.member_id, pack).await.unwrap();
        store.apply_pack_entries(guest.member_id, pack).await.unwrap();

        let template = ModuleViewConfig::with_subviews([("pipeline", false)]);
        store
            .upsert_role_view_template(org, MemberRole::Member, RbacModule::Crm, &template, true)
            .await
            .unwrap();

        assert!(store
            .get_member_view_override(member.member_id, RbacModule::Crm)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_member_view_override(guest.member_id, RbacModule::Crm)
            .await
            .unwrap()
            .is_some());
        assert_eq!(
            store
                .get_role_view_template(org, MemberRole::Member, RbacModule::Crm)
                .await
                .unwrap(),
            Some(template)
        );
    }

    #[tokio::test]
    async fn unhealthy_store_reports_error() {
        let store = MockStore::new();
        assert!(store.health_check().await.is_ok());
        store.set_healthy(false);
        assert!(store.health_check().await.is_err());
    }
}
