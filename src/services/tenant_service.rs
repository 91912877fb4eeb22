use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::database::{NamespaceCache, ProvisionOutcome, SchemaProvisioner, TenantRegistry};
use crate::tenancy::{NamespaceName, Tenant, TenantError, TenantStatus};

/// Namespace health as reported to operators
#[derive(Debug, Clone, Serialize)]
pub struct TenantHealth {
    pub slug: String,
    pub status: TenantStatus,
    pub namespace: NamespaceName,
    pub schema_exists: bool,
    pub missing_tables: Vec<String>,
    pub healthy: bool,
}

/// Operator-facing tenant lifecycle.
///
/// Works on the shared registry with unbound sessions; nothing here runs
/// inside a tenant context. Every status change invalidates the namespace
/// cache so the session binder sees it on the next bind.
#[derive(Clone)]
pub struct TenantService {
    registry: Arc<dyn TenantRegistry>,
    provisioner: SchemaProvisioner,
    cache: Arc<NamespaceCache>,
    provision_timeout: Duration,
}

impl TenantService {
    pub fn new(
        registry: Arc<dyn TenantRegistry>,
        provisioner: SchemaProvisioner,
        cache: Arc<NamespaceCache>,
        provision_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            provisioner,
            cache,
            provision_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<dyn TenantRegistry> {
        &self.registry
    }

    pub fn provisioner(&self) -> &SchemaProvisioner {
        &self.provisioner
    }

    /// Register a tenant and start provisioning in the background.
    /// Returns as soon as the registry row exists, still `provisioning`.
    pub async fn create_tenant(&self, slug: &str, settings: Map<String, Value>) -> Result<Tenant, TenantError> {
        let tenant = self.registry.create(slug, settings).await?;
        self.spawn_provisioning(tenant.clone());
        Ok(tenant)
    }

    /// Provision on a background task bounded by the configured timeout.
    /// Failures are logged and leave the tenant in `provisioning` for a retry.
    pub fn spawn_provisioning(&self, tenant: Tenant) -> JoinHandle<Option<ProvisionOutcome>> {
        let service = self.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(service.provision_timeout, service.provisioner.provision(&tenant)).await {
                Ok(Ok(outcome)) => {
                    service.cache.invalidate(tenant.id).await;
                    Some(outcome)
                }
                Ok(Err(e)) if e.is_retryable() => {
                    tracing::error!(
                        "Provisioning tenant '{}' failed, it stays {} for a retry: {}",
                        tenant.slug,
                        tenant.status,
                        e
                    );
                    None
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provisioning tenant '{}' skipped: {}", tenant.slug, e);
                    None
                }
                Err(_) => {
                    tracing::warn!(
                        "Provisioning tenant '{}' timed out after {:?}; it can be retried",
                        tenant.slug,
                        service.provision_timeout
                    );
                    None
                }
            }
        })
    }

    /// Provision in the caller's task (operator retry)
    pub async fn provision_now(&self, slug: &str) -> Result<(Tenant, ProvisionOutcome), TenantError> {
        let tenant = self.registry.get_by_slug(slug).await?;
        let outcome = tokio::time::timeout(self.provision_timeout, self.provisioner.provision(&tenant))
            .await
            .map_err(|_| {
                TenantError::SchemaOperation(format!(
                    "provisioning '{}' timed out after {:?}",
                    slug, self.provision_timeout
                ))
            })??;
        self.cache.invalidate(tenant.id).await;
        Ok((self.registry.get_by_id(tenant.id).await?, outcome))
    }

    pub async fn suspend(&self, slug: &str) -> Result<Tenant, TenantError> {
        self.transition(slug, TenantStatus::Active, TenantStatus::Suspended).await
    }

    pub async fn activate(&self, slug: &str) -> Result<Tenant, TenantError> {
        self.transition(slug, TenantStatus::Suspended, TenantStatus::Active).await
    }

    /// Move the tenant to `deleted` and drop its namespace.
    /// Repeating the call on a deleted tenant retries the teardown.
    pub async fn deprovision(&self, slug: &str) -> Result<Tenant, TenantError> {
        let mut tenant = self.registry.get_by_slug(slug).await?;

        if tenant.status.is_terminal() {
            tracing::info!("Tenant '{}' already deleted, retrying namespace teardown", tenant.slug);
        } else if tenant.status == TenantStatus::Active {
            tenant = self
                .registry
                .update_status(tenant.id, TenantStatus::Active, TenantStatus::Deleted)
                .await?;
        }
        self.cache.invalidate(tenant.id).await;

        let result = self.provisioner.deprovision(&tenant).await;
        self.cache.invalidate(tenant.id).await;
        result
    }

    pub async fn update_settings(&self, slug: &str, settings: Map<String, Value>) -> Result<Tenant, TenantError> {
        let tenant = self.registry.get_by_slug(slug).await?;
        self.registry.update_settings(tenant.id, settings).await
    }

    pub async fn health(&self, slug: &str) -> Result<TenantHealth, TenantError> {
        let tenant = self.registry.get_by_slug(slug).await?;
        let schema_exists = self.provisioner.schema_exists(&tenant).await?;
        let missing_tables = if schema_exists {
            self.provisioner.missing_tables(&tenant).await?
        } else {
            self.provisioner.catalog().table_names().into_iter().map(str::to_string).collect()
        };

        let healthy = match tenant.status {
            TenantStatus::Active | TenantStatus::Suspended => schema_exists && missing_tables.is_empty(),
            TenantStatus::Deleted => !schema_exists,
            TenantStatus::Provisioning => false,
        };

        Ok(TenantHealth {
            slug: tenant.slug,
            status: tenant.status,
            namespace: tenant.namespace_name,
            schema_exists,
            missing_tables,
            healthy,
        })
    }

    /// Restart provisioning for every tenant left in `provisioning`,
    /// e.g. after a crash. Runs the attempts concurrently and waits for them.
    pub async fn resume_pending(&self) -> Result<usize, TenantError> {
        let pending = self.registry.list(Some(TenantStatus::Provisioning)).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        tracing::info!("Resuming provisioning for {} tenant(s)", pending.len());
        let handles = pending.into_iter().map(|tenant| self.spawn_provisioning(tenant));
        let completed = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter(|result| matches!(result, Ok(Some(_))))
            .count();

        Ok(completed)
    }

    async fn transition(&self, slug: &str, from: TenantStatus, to: TenantStatus) -> Result<Tenant, TenantError> {
        let tenant = self.registry.get_by_slug(slug).await?;
        let updated = self.registry.update_status(tenant.id, from, to).await?;
        self.cache.invalidate(tenant.id).await;
        Ok(updated)
    }
}
