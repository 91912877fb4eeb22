// Namespace provisioning and teardown
//
// All DDL for one tenant runs in a single transaction with IF NOT EXISTS
// guards, serialized per namespace by an advisory lock. Postgres DDL is
// transactional, so an interrupted run leaves nothing behind and a retry
// starts from a clean slate or a complete namespace.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use super::catalog::{TableCatalog, TOUCH_FUNCTION};
use super::registry::TenantRegistry;
use crate::tenancy::{Tenant, TenantError, TenantStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    /// Namespace created and tenant moved to `active`
    Provisioned,
    /// Tenant was already active with a complete namespace; nothing changed
    AlreadyProvisioned,
}

#[derive(Clone)]
pub struct SchemaProvisioner {
    pool: PgPool,
    registry: Arc<dyn TenantRegistry>,
    catalog: Arc<TableCatalog>,
    namespace_prefix: String,
}

impl SchemaProvisioner {
    pub fn new(
        pool: PgPool,
        registry: Arc<dyn TenantRegistry>,
        catalog: Arc<TableCatalog>,
        namespace_prefix: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            registry,
            catalog,
            namespace_prefix: namespace_prefix.into(),
        }
    }

    pub fn catalog(&self) -> &TableCatalog {
        &self.catalog
    }

    /// Materialize the tenant's namespace and move it to `active`.
    ///
    /// Safe to repeat: an active tenant with every expected table is a no-op,
    /// and losing the `provisioning -> active` race to a concurrent run is
    /// reported as `AlreadyProvisioned`.
    pub async fn provision(&self, tenant: &Tenant) -> Result<ProvisionOutcome, TenantError> {
        // the caller's copy may be stale, e.g. a resumed run for a tenant deleted since
        let tenant = &self.registry.get_by_id(tenant.id).await?;
        match tenant.status {
            TenantStatus::Provisioning => {}
            TenantStatus::Active => {
                let missing = self.missing_tables(tenant).await?;
                if missing.is_empty() {
                    return Ok(ProvisionOutcome::AlreadyProvisioned);
                }
                return Err(TenantError::SchemaOperation(format!(
                    "namespace {} of active tenant '{}' is missing tables: {}",
                    tenant.namespace_name,
                    tenant.slug,
                    missing.join(", ")
                )));
            }
            status @ (TenantStatus::Suspended | TenantStatus::Deleted) => {
                return Err(TenantError::transition(status, TenantStatus::Active, status));
            }
        }

        if !self.create_namespace(tenant).await? {
            info!("Tenant '{}' was provisioned by a concurrent run", tenant.slug);
            return Ok(ProvisionOutcome::AlreadyProvisioned);
        }

        match self
            .registry
            .update_status(tenant.id, TenantStatus::Provisioning, TenantStatus::Active)
            .await
        {
            Ok(_) => {
                info!("Provisioned namespace {} for tenant '{}'", tenant.namespace_name, tenant.slug);
                Ok(ProvisionOutcome::Provisioned)
            }
            Err(TenantError::InvalidTransition {
                current: TenantStatus::Active,
                ..
            }) => {
                info!("Tenant '{}' was activated by a concurrent provisioning run", tenant.slug);
                Ok(ProvisionOutcome::AlreadyProvisioned)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the tenant's namespace and everything in it.
    ///
    /// A suspended tenant is moved to `deleted` first so no new request can
    /// bind to the namespace while it is dropped. A tenant already `deleted`
    /// gets its teardown retried. `provisioning` and `active` are rejected.
    pub async fn deprovision(&self, tenant: &Tenant) -> Result<Tenant, TenantError> {
        let tenant = match tenant.status {
            TenantStatus::Suspended => {
                self.registry
                    .update_status(tenant.id, TenantStatus::Suspended, TenantStatus::Deleted)
                    .await?
            }
            TenantStatus::Deleted => tenant.clone(),
            status @ (TenantStatus::Provisioning | TenantStatus::Active) => {
                return Err(TenantError::transition(status, TenantStatus::Deleted, status));
            }
        };

        let schema = tenant.namespace_name.sql_ident(&self.namespace_prefix)?;
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                TenantError::SchemaOperation(format!("failed to drop namespace {}: {}", tenant.namespace_name, e))
            })?;

        info!("Dropped namespace {} of tenant '{}'", tenant.namespace_name, tenant.slug);
        Ok(tenant)
    }

    pub async fn schema_exists(&self, tenant: &Tenant) -> Result<bool, TenantError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
        )
        .bind(tenant.namespace_name.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Catalog tables absent from the tenant's namespace, in catalog order
    pub async fn missing_tables(&self, tenant: &Tenant) -> Result<Vec<String>, TenantError> {
        let present: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables WHERE table_schema = $1",
        )
        .bind(tenant.namespace_name.as_str())
        .fetch_all(&self.pool)
        .await?;

        let present: HashSet<&str> = present.iter().map(String::as_str).collect();
        Ok(self
            .catalog
            .table_names()
            .into_iter()
            .filter(|name| !present.contains(name))
            .map(str::to_string)
            .collect())
    }

    /// Run the namespace DDL under a per-namespace advisory lock. Returns
    /// false without touching anything when a concurrent run already
    /// activated the tenant while this one waited for the lock.
    async fn create_namespace(&self, tenant: &Tenant) -> Result<bool, TenantError> {
        let schema = tenant.namespace_name.sql_ident(&self.namespace_prefix)?;

        let mut statements = Vec::with_capacity(2 + self.catalog.tables.len() * 3);
        statements.push(format!("CREATE SCHEMA IF NOT EXISTS {}", schema));
        statements.push(format!(
            "CREATE OR REPLACE FUNCTION {}.\"{}\"() RETURNS TRIGGER AS $fn$
             BEGIN NEW.updated_at = now(); RETURN NEW; END;
             $fn$ LANGUAGE plpgsql",
            schema, TOUCH_FUNCTION
        ));
        for table in &self.catalog.tables {
            statements.push(table.create_table_ddl(&schema)?);
            statements.push(format!(
                "DROP TRIGGER IF EXISTS \"{}\" ON {}.\"{}\"",
                table.trigger_name(),
                schema,
                table.name
            ));
            statements.push(format!(
                "CREATE TRIGGER \"{}\" BEFORE UPDATE ON {}.\"{}\"
                 FOR EACH ROW EXECUTE FUNCTION {}.\"{}\"()",
                table.trigger_name(),
                schema,
                table.name,
                schema,
                TOUCH_FUNCTION
            ));
        }

        let schema_error = |e: sqlx::Error| {
            warn!("Provisioning namespace {} failed: {}", tenant.namespace_name, e);
            TenantError::SchemaOperation(format!("failed to provision namespace {}: {}", tenant.namespace_name, e))
        };

        let mut tx = self.pool.begin().await.map_err(schema_error)?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(tenant.namespace_name.as_str())
            .execute(&mut *tx)
            .await
            .map_err(schema_error)?;

        if self.registry.get_by_id(tenant.id).await?.status != TenantStatus::Provisioning {
            return Ok(false);
        }

        for statement in &statements {
            sqlx::query(statement).execute(&mut *tx).await.map_err(schema_error)?;
        }
        tx.commit().await.map_err(schema_error)?;

        Ok(true)
    }
}
