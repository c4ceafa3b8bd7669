//! PostgreSQL implementation of [`AccessStore`].

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::error::ServiceError;
use super::store::{AccessStore, RegistrySlot};
use crate::models::{
    MemberRole, MemberViewOverride, Membership, ModulePermissions, ModuleViewConfig,
    PermissionMatrix, PermissionPack, RbacModule, RegistryEntry, RoleViewTemplate,
};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    module_code: String,
    can_read: bool,
    can_create: bool,
    can_update: bool,
    can_delete: bool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessStore for Database {
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }

    // ==================== Registry Operations ====================

    async fn list_registry_entries(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<RegistryEntry>, ServiceError> {
        let entries = sqlx::query_as::<_, RegistryEntry>(
            "SELECT * FROM registry_entries WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn upsert_registry_entry(
        &self,
        entry: &RegistryEntry,
    ) -> Result<RegistryEntry, ServiceError> {
        let stored = sqlx::query_as::<_, RegistryEntry>(
            r#"
            INSERT INTO registry_entries
                (entry_id, account_id, scope_code, project_id, user_id, config_key, config_value, updated_by, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT ON CONSTRAINT registry_entries_slot_key DO UPDATE
            SET config_value = EXCLUDED.config_value,
                updated_by = EXCLUDED.updated_by,
                updated_utc = EXCLUDED.updated_utc
            RETURNING *
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.account_id)
        .bind(&entry.scope_code)
        .bind(entry.project_id)
        .bind(entry.user_id)
        .bind(&entry.config_key)
        .bind(&entry.config_value)
        .bind(entry.updated_by)
        .bind(entry.updated_utc)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn remove_registry_entry(&self, slot: &RegistrySlot) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            DELETE FROM registry_entries
            WHERE account_id = $1
              AND scope_code = $2
              AND project_id IS NOT DISTINCT FROM $3
              AND user_id IS NOT DISTINCT FROM $4
              AND config_key = $5
            "#,
        )
        .bind(slot.account_id)
        .bind(slot.scope.as_str())
        .bind(slot.project_id)
        .bind(slot.user_id)
        .bind(slot.key.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Membership Operations ====================

    async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, ServiceError> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    async fn find_membership_by_id(
        &self,
        member_id: Uuid,
    ) -> Result<Option<Membership>, ServiceError> {
        let membership =
            sqlx::query_as::<_, Membership>("SELECT * FROM memberships WHERE member_id = $1")
                .bind(member_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(membership)
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO memberships (member_id, organization_id, user_id, role_code, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(membership.member_id)
        .bind(membership.organization_id)
        .bind(membership.user_id)
        .bind(&membership.role_code)
        .bind(membership.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Permission Operations ====================

    async fn get_permission_matrix(
        &self,
        member_id: Uuid,
    ) -> Result<PermissionMatrix, ServiceError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT module_code, can_read, can_create, can_update, can_delete FROM member_permissions WHERE member_id = $1",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        let mut matrix = PermissionMatrix::new();
        for row in rows {
            match row.module_code.parse::<RbacModule>() {
                Ok(module) => matrix.set(
                    module,
                    ModulePermissions {
                        read: row.can_read,
                        create: row.can_create,
                        update: row.can_update,
                        delete: row.can_delete,
                    },
                ),
                Err(e) => {
                    tracing::warn!(member_id = %member_id, error = %e, "Skipping permission row");
                }
            }
        }
        Ok(matrix)
    }

    async fn set_module_permissions(
        &self,
        member_id: Uuid,
        module: RbacModule,
        permissions: ModulePermissions,
    ) -> Result<(), ServiceError> {
        upsert_permissions(&self.pool, member_id, module, permissions).await
    }

    // ==================== View Operations ====================

    async fn get_role_view_template(
        &self,
        organization_id: Uuid,
        role: MemberRole,
        module: RbacModule,
    ) -> Result<Option<ModuleViewConfig>, ServiceError> {
        let row = sqlx::query_as::<_, RoleViewTemplate>(
            r#"
            SELECT * FROM role_view_templates
            WHERE organization_id = $1 AND role_code = $2 AND module_code = $3
            "#,
        )
        .bind(organization_id)
        .bind(role.as_str())
        .bind(module.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ModuleViewConfig::from))
    }

    async fn upsert_role_view_template(
        &self,
        organization_id: Uuid,
        role: MemberRole,
        module: RbacModule,
        config: &ModuleViewConfig,
        apply_to_all: bool,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO role_view_templates
                (organization_id, role_code, module_code, subviews_enabled, layout, updated_utc)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (organization_id, role_code, module_code) DO UPDATE
            SET subviews_enabled = EXCLUDED.subviews_enabled,
                layout = EXCLUDED.layout,
                updated_utc = EXCLUDED.updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(role.as_str())
        .bind(module.as_str())
        .bind(Json(&config.subviews_enabled))
        .bind(config.layout.as_ref().map(Json))
        .execute(&mut *tx)
        .await?;

        if apply_to_all {
            let cleared = sqlx::query(
                r#"
                DELETE FROM member_view_overrides o
                USING memberships m
                WHERE o.member_id = m.member_id
                  AND m.organization_id = $1
                  AND m.role_code = $2
                  AND o.module_code = $3
                "#,
            )
            .bind(organization_id)
            .bind(role.as_str())
            .bind(module.as_str())
            .execute(&mut *tx)
            .await?;
            tracing::debug!(cleared = cleared.rows_affected(), "Cleared member view overrides");
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_member_view_override(
        &self,
        member_id: Uuid,
        module: RbacModule,
    ) -> Result<Option<ModuleViewConfig>, ServiceError> {
        let row = sqlx::query_as::<_, MemberViewOverride>(
            "SELECT * FROM member_view_overrides WHERE member_id = $1 AND module_code = $2",
        )
        .bind(member_id)
        .bind(module.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| ModuleViewConfig::with_subviews(r.subviews_enabled.0)))
    }

    // ==================== Pack Operations ====================

    async fn apply_pack_entries(
        &self,
        member_id: Uuid,
        pack: &PermissionPack,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Serialize concurrent pack applications for the same member.
        sqlx::query("SELECT member_id FROM memberships WHERE member_id = $1 FOR UPDATE")
            .bind(member_id)
            .execute(&mut *tx)
            .await?;

        for (module, grant) in &pack.modules {
            upsert_permissions(&mut *tx, member_id, *module, grant.actions).await?;

            sqlx::query(
                r#"
                INSERT INTO member_view_overrides (member_id, module_code, subviews_enabled, updated_utc)
                VALUES ($1, $2, $3, NOW())
                ON CONFLICT (member_id, module_code) DO UPDATE
                SET subviews_enabled = EXCLUDED.subviews_enabled,
                    updated_utc = EXCLUDED.updated_utc
                "#,
            )
            .bind(member_id)
            .bind(module.as_str())
            .bind(Json(&grant.default_subviews))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn upsert_permissions<'e, E>(
    executor: E,
    member_id: Uuid,
    module: RbacModule,
    permissions: ModulePermissions,
) -> Result<(), ServiceError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO member_permissions
            (member_id, module_code, can_read, can_create, can_update, can_delete, updated_utc)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (member_id, module_code) DO UPDATE
        SET can_read = EXCLUDED.can_read,
            can_create = EXCLUDED.can_create,
            can_update = EXCLUDED.can_update,
            can_delete = EXCLUDED.can_delete,
            updated_utc = EXCLUDED.updated_utc
        "#,
    )
    .bind(member_id)
    .bind(module.as_str())
    .bind(permissions.read)
    .bind(permissions.create)
    .bind(permissions.update)
    .bind(permissions.delete)
    .execute(executor)
    .await?;
    Ok(())
}
