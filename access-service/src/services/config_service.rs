//! Calling layer around the pure resolver: fetches the layers, owns the cache.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::cache::TtlCache;
use super::cms::CachedCms;
use super::config_resolver::{self, ResolvedConfig};
use super::error::ServiceError;
use super::metrics;
use super::store::{AccessStore, RegistrySlot};
use crate::defaults::{self, DefaultTable};
use crate::models::{ConfigContext, ConfigKey, ConfigValue, RegistryEntry, RegistryScope, SourceTag};

/// Registry write as requested by an administrator.
#[derive(Debug, Clone)]
pub struct RegistryWrite {
    pub key: ConfigKey,
    pub value: ConfigValue,
    pub scope: RegistryScope,
    pub project_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ConfigService {
    store: Arc<dyn AccessStore>,
    cms: CachedCms,
    defaults: &'static DefaultTable,
    cache: TtlCache<ConfigContext, Arc<ResolvedConfig>>,
}

impl ConfigService {
    pub fn new(store: Arc<dyn AccessStore>, cms: CachedCms, ttl: Duration) -> Self {
        Self {
            store,
            cms,
            defaults: defaults::builtin(),
            cache: TtlCache::new(ttl),
        }
    }

    /// Effective configuration for `ctx`. `force_refresh` bypasses both the
    /// resolution cache and the CMS snapshot cache.
    pub async fn resolve(
        &self,
        ctx: &ConfigContext,
        force_refresh: bool,
    ) -> Result<Arc<ResolvedConfig>, ServiceError> {
        if !force_refresh {
            if let Some(cached) = self.cache.get(ctx) {
                metrics::record_config_resolution(true);
                return Ok(cached);
            }
        }

        let registry = self.store.list_registry_entries(ctx.account_id).await?;
        let cms = self.cms.layer(force_refresh).await;
        let resolved = Arc::new(config_resolver::resolve(
            self.defaults,
            &cms,
            &registry,
            ctx,
            Utc::now(),
        ));

        if !resolved.meta.strapi_available {
            tracing::debug!(account_id = %ctx.account_id, "Resolved configuration without CMS");
        }

        self.cache.insert(*ctx, Arc::clone(&resolved));
        metrics::record_config_resolution(false);
        Ok(resolved)
    }

    /// Single key lookup. `None` when no layer defines the key.
    pub async fn lookup(
        &self,
        ctx: &ConfigContext,
        key: &ConfigKey,
    ) -> Result<Option<(ConfigValue, SourceTag)>, ServiceError> {
        if let Some(cached) = self.cache.get(ctx) {
            metrics::record_config_resolution(true);
            return Ok(cached
                .effective
                .get(key)
                .cloned()
                .zip(cached.sources.get(key).map(|s| s.source)));
        }

        let registry = self.store.list_registry_entries(ctx.account_id).await?;
        let cms = self.cms.layer(false).await;
        metrics::record_config_resolution(false);
        Ok(config_resolver::resolve_key(
            key,
            self.defaults,
            &cms,
            &registry,
            ctx,
        ))
    }

    /// Upsert a registry override and drop every cached resolution of the account.
    pub async fn write_override(
        &self,
        account_id: Uuid,
        write: RegistryWrite,
        updated_by: Uuid,
    ) -> Result<RegistryEntry, ServiceError> {
        let (project_id, user_id) = match write.scope {
            RegistryScope::Account => (None, None),
            RegistryScope::Project => (
                Some(write.project_id.ok_or_else(|| {
                    ServiceError::ValidationError("projectId is required for project scope".into())
                })?),
                None,
            ),
            RegistryScope::User => (
                None,
                Some(write.user_id.ok_or_else(|| {
                    ServiceError::ValidationError("userId is required for user scope".into())
                })?),
            ),
        };

        let mut entry = RegistryEntry::new(
            account_id,
            write.scope,
            project_id,
            user_id,
            &write.key,
            write.value,
        );
        entry.updated_by = Some(updated_by);

        let stored = self.store.upsert_registry_entry(&entry).await?;
        self.invalidate_account(account_id);

        tracing::info!(
            account_id = %account_id,
            config_key = %write.key,
            scope = write.scope.as_str(),
            updated_by = %updated_by,
            "Registry override written"
        );
        Ok(stored)
    }

    pub async fn remove_override(&self, slot: &RegistrySlot) -> Result<bool, ServiceError> {
        let removed = self.store.remove_registry_entry(slot).await?;
        if removed {
            self.invalidate_account(slot.account_id);
            tracing::info!(account_id = %slot.account_id, config_key = %slot.key, "Registry override removed");
        }
        Ok(removed)
    }

    pub fn invalidate_account(&self, account_id: Uuid) {
        self.cache.invalidate_where(|ctx| ctx.account_id == account_id);
    }
}
