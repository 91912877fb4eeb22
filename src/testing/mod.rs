use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::database::{MemoryTenantRegistry, NamespaceCache, SchemaProvisioner, TableCatalog, TenantRegistry};
use crate::services::TenantService;
use crate::tenancy::{Tenant, TenantStatus};

pub const TEST_PREFIX: &str = "tenant_";

/// Fixture for unit tests that need tenants in specific lifecycle states
/// without a database
pub struct TestContext {
    pub registry: Arc<MemoryTenantRegistry>,
    pub cache: Arc<NamespaceCache>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(MemoryTenantRegistry::new(TEST_PREFIX)),
            cache: Arc::new(NamespaceCache::new(Duration::from_secs(60))),
        }
    }

    /// Register a tenant and walk it through the lifecycle to `status`
    pub async fn tenant_in(&self, slug: &str, status: TenantStatus) -> anyhow::Result<Tenant> {
        let tenant = self.registry.create(slug, Map::new()).await?;
        let path: &[TenantStatus] = match status {
            TenantStatus::Provisioning => &[],
            TenantStatus::Active => &[TenantStatus::Active],
            TenantStatus::Suspended => &[TenantStatus::Active, TenantStatus::Suspended],
            TenantStatus::Deleted => &[TenantStatus::Active, TenantStatus::Deleted],
        };

        let mut current = tenant.status;
        for next in path {
            self.registry.update_status(tenant.id, current, *next).await?;
            current = *next;
        }
        Ok(self.registry.get_by_id(tenant.id).await?)
    }

    /// Service over the in-memory registry. The pool never connects, so only
    /// registry-level operations (transitions, settings) may be exercised.
    pub fn service(&self) -> anyhow::Result<TenantService> {
        let registry: Arc<dyn TenantRegistry> = self.registry.clone();
        let provisioner = SchemaProvisioner::new(
            lazy_pool()?,
            registry.clone(),
            Arc::new(TableCatalog::builtin()?),
            TEST_PREFIX,
        );
        Ok(TenantService::new(
            registry,
            provisioner,
            self.cache.clone(),
            Duration::from_secs(5),
        ))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool that never opens a connection unless a query is issued
pub fn lazy_pool() -> anyhow::Result<PgPool> {
    Ok(PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://portal@127.0.0.1:1/unreachable")?)
}
