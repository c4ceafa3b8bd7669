//! Membership permission snapshots, view resolution and administrative writes.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::access_guard::MembershipAccess;
use super::cache::TtlCache;
use super::error::ServiceError;
use super::metrics;
use super::store::AccessStore;
use crate::defaults::{packs, views};
use crate::models::{
    MemberRole, Membership, ModulePermissions, ModuleViewConfig, PermissionMatrix, PermissionPack,
    RbacModule,
};

/// Snapshot cache key: (organization, member).
type SnapshotKey = (Uuid, Uuid);

#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn AccessStore>,
    cache: TtlCache<SnapshotKey, Arc<MembershipAccess>>,
}

impl PermissionService {
    pub fn new(store: Arc<dyn AccessStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new(ttl),
        }
    }

    /// The caller's membership in `organization_id`.
    pub async fn current_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Membership, ServiceError> {
        self.store
            .find_membership(organization_id, user_id)
            .await?
            .ok_or(ServiceError::NotAMember)
    }

    /// Permissions plus the effective view of every module.
    pub async fn snapshot(
        &self,
        membership: &Membership,
    ) -> Result<Arc<MembershipAccess>, ServiceError> {
        let key = (membership.organization_id, membership.member_id);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let permissions = self.store.get_permission_matrix(membership.member_id).await?;
        let mut access = MembershipAccess::new(membership.member_id, membership.role(), permissions);
        for module in RbacModule::ALL {
            let view = self.effective_view(membership, module).await?;
            access = access.with_view(module, view);
        }

        let access = Arc::new(access);
        self.cache.insert(key, Arc::clone(&access));
        Ok(access)
    }

    /// Organization role template, else the built-in role template, with the
    /// member override (if any) replacing only `subviews_enabled`.
    pub async fn effective_view(
        &self,
        membership: &Membership,
        module: RbacModule,
    ) -> Result<ModuleViewConfig, ServiceError> {
        let role = membership.role();
        let mut view = match self
            .store
            .get_role_view_template(membership.organization_id, role, module)
            .await?
        {
            Some(template) => template,
            None => views::role_template(role, module),
        };

        if let Some(member_override) = self
            .store
            .get_member_view_override(membership.member_id, module)
            .await?
        {
            view.subviews_enabled = member_override.subviews_enabled;
        }

        Ok(view)
    }

    pub async fn set_module_permissions(
        &self,
        actor: &Membership,
        member_id: Uuid,
        module: RbacModule,
        permissions: ModulePermissions,
    ) -> Result<PermissionMatrix, ServiceError> {
        require_admin(actor)?;
        let target = self.target_member(actor, member_id).await?;

        self.store
            .set_module_permissions(target.member_id, module, permissions)
            .await?;
        self.invalidate_member(&target);

        tracing::info!(
            organization_id = %actor.organization_id,
            member_id = %target.member_id,
            module = module.as_str(),
            updated_by = %actor.member_id,
            "Module permissions updated"
        );
        self.store.get_permission_matrix(target.member_id).await
    }

    pub async fn update_role_template(
        &self,
        actor: &Membership,
        role: MemberRole,
        module: RbacModule,
        config: &ModuleViewConfig,
        apply_to_all: bool,
    ) -> Result<(), ServiceError> {
        require_admin(actor)?;

        self.store
            .upsert_role_view_template(actor.organization_id, role, module, config, apply_to_all)
            .await?;
        let organization_id = actor.organization_id;
        self.cache.invalidate_where(|(org, _)| *org == organization_id);

        tracing::info!(
            organization_id = %organization_id,
            role = role.as_str(),
            module = module.as_str(),
            apply_to_all,
            "Role view template updated"
        );
        Ok(())
    }

    /// Overwrite the member's covered modules with the pack's definition.
    ///
    /// An unknown pack or member fails before anything is written.
    pub async fn apply_pack(
        &self,
        actor: &Membership,
        member_id: Uuid,
        pack_id: &str,
    ) -> Result<(&'static PermissionPack, PermissionMatrix), ServiceError> {
        require_admin(actor)?;
        let pack = packs::find(pack_id).ok_or_else(|| ServiceError::PackNotFound(pack_id.to_string()))?;
        let target = self.target_member(actor, member_id).await?;

        self.store.apply_pack_entries(target.member_id, pack).await?;
        self.invalidate_member(&target);
        metrics::record_pack_application(&pack.pack_id);

        tracing::info!(
            organization_id = %actor.organization_id,
            member_id = %target.member_id,
            pack_id = %pack.pack_id,
            pack_version = pack.version,
            updated_by = %actor.member_id,
            "Permission pack applied"
        );
        let matrix = self.store.get_permission_matrix(target.member_id).await?;
        Ok((pack, matrix))
    }

    /// Target of an administrative write; must belong to the actor's organization.
    async fn target_member(
        &self,
        actor: &Membership,
        member_id: Uuid,
    ) -> Result<Membership, ServiceError> {
        self.store
            .find_membership_by_id(member_id)
            .await?
            .filter(|m| m.organization_id == actor.organization_id)
            .ok_or(ServiceError::MembershipNotFound)
    }

    fn invalidate_member(&self, membership: &Membership) {
        self.cache
            .invalidate(&(membership.organization_id, membership.member_id));
    }
}

fn require_admin(actor: &Membership) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::AdminRequired)
    }
}
