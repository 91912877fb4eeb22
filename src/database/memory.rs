use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::registry::{check_edge, prepare_new_tenant, TenantRegistry};
use crate::tenancy::{Tenant, TenantError, TenantId, TenantStatus};

/// Process-local registry with the same semantics as `PgTenantRegistry`.
/// Used by tests and by embedders that keep the registry elsewhere.
pub struct MemoryTenantRegistry {
    namespace_prefix: String,
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl MemoryTenantRegistry {
    pub fn new(namespace_prefix: impl Into<String>) -> Self {
        Self {
            namespace_prefix: namespace_prefix.into(),
            tenants: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TenantRegistry for MemoryTenantRegistry {
    async fn create(&self, slug: &str, settings: Map<String, Value>) -> Result<Tenant, TenantError> {
        let namespace = prepare_new_tenant(&self.namespace_prefix, slug)?;

        let mut tenants = self.tenants.write().await;
        if tenants
            .values()
            .any(|t| t.slug == slug || t.namespace_name == namespace)
        {
            return Err(TenantError::SlugConflict(slug.to_string()));
        }

        let now = Utc::now();
        let tenant = Tenant {
            id: TenantId::new(),
            slug: slug.to_string(),
            namespace_name: namespace,
            status: TenantStatus::Provisioning,
            settings,
            created_at: now,
            updated_at: now,
        };
        tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn get_by_id(&self, id: TenantId) -> Result<Tenant, TenantError> {
        self.tenants
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| TenantError::NotFound(id.to_string()))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Tenant, TenantError> {
        self.tenants
            .read()
            .await
            .values()
            .find(|t| t.slug == slug)
            .cloned()
            .ok_or_else(|| TenantError::NotFound(slug.to_string()))
    }

    async fn update_status(&self, id: TenantId, from: TenantStatus, to: TenantStatus) -> Result<Tenant, TenantError> {
        check_edge(from, to)?;

        let mut tenants = self.tenants.write().await;
        let tenant = tenants
            .get_mut(&id)
            .ok_or_else(|| TenantError::NotFound(id.to_string()))?;

        if tenant.status != from {
            return Err(TenantError::transition(from, to, tenant.status));
        }
        tenant.status = to;
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }

    async fn update_settings(&self, id: TenantId, settings: Map<String, Value>) -> Result<Tenant, TenantError> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants
            .get_mut(&id)
            .ok_or_else(|| TenantError::NotFound(id.to_string()))?;
        tenant.settings = settings;
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }

    async fn list(&self, status: Option<TenantStatus>) -> Result<Vec<Tenant>, TenantError> {
        let mut tenants: Vec<Tenant> = self
            .tenants
            .read()
            .await
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        tenants.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.slug.cmp(&b.slug)));
        Ok(tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry() -> MemoryTenantRegistry {
        MemoryTenantRegistry::new("tenant_")
    }

    #[tokio::test]
    async fn create_starts_in_provisioning_with_derived_namespace() {
        let registry = registry();
        let tenant = registry.create("acme", Map::new()).await.unwrap();

        assert_eq!(tenant.status, TenantStatus::Provisioning);
        assert_eq!(tenant.namespace_name.as_str(), "tenant_acme");
        assert_eq!(registry.get_by_slug("acme").await.unwrap().id, tenant.id);
        assert_eq!(registry.get_by_id(tenant.id).await.unwrap().slug, "acme");
    }

    #[tokio::test]
    async fn slugs_are_never_reused() {
        let registry = registry();
        let tenant = registry.create("acme", Map::new()).await.unwrap();
        assert!(matches!(
            registry.create("acme", Map::new()).await,
            Err(TenantError::SlugConflict(_))
        ));

        registry.update_status(tenant.id, TenantStatus::Provisioning, TenantStatus::Active).await.unwrap();
        registry.update_status(tenant.id, TenantStatus::Active, TenantStatus::Deleted).await.unwrap();
        assert!(matches!(
            registry.create("acme", Map::new()).await,
            Err(TenantError::SlugConflict(_))
        ));
    }

    #[tokio::test]
    async fn rejects_invalid_slugs() {
        assert!(matches!(
            registry().create("Bad Slug", Map::new()).await,
            Err(TenantError::InvalidSlug(_))
        ));
        // would be read back as a tenant id by the resolver
        assert!(matches!(
            registry().create("deadbeefdeadbeefdeadbeefdeadbeef", Map::new()).await,
            Err(TenantError::InvalidSlug(_))
        ));
    }

    #[tokio::test]
    async fn lookups_of_unknown_tenants_fail() {
        let registry = registry();
        assert!(matches!(registry.get_by_slug("nope").await, Err(TenantError::NotFound(_))));
        assert!(matches!(registry.get_by_id(TenantId::new()).await, Err(TenantError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_status_is_compare_and_set() {
        let registry = registry();
        let tenant = registry.create("acme", Map::new()).await.unwrap();

        // stored status is provisioning, caller believes active
        let err = registry
            .update_status(tenant.id, TenantStatus::Active, TenantStatus::Suspended)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TenantError::InvalidTransition { current: TenantStatus::Provisioning, .. }
        ));

        // edge not in the state machine
        assert!(registry
            .update_status(tenant.id, TenantStatus::Provisioning, TenantStatus::Suspended)
            .await
            .is_err());

        let active = registry
            .update_status(tenant.id, TenantStatus::Provisioning, TenantStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.status, TenantStatus::Active);
    }

    #[tokio::test]
    async fn only_one_concurrent_transition_wins() {
        let registry = Arc::new(registry());
        let id = registry.create("acme", Map::new()).await.unwrap().id;

        let attempts = (0..8).map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .update_status(id, TenantStatus::Provisioning, TenantStatus::Active)
                    .await
                    .is_ok()
            })
        });
        let wins = futures::future::join_all(attempts)
            .await
            .into_iter()
            .filter(|r| *r.as_ref().unwrap())
            .count();
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn deleted_is_terminal() {
        let registry = registry();
        let tenant = registry.create("acme", Map::new()).await.unwrap();
        registry.update_status(tenant.id, TenantStatus::Provisioning, TenantStatus::Active).await.unwrap();
        registry.update_status(tenant.id, TenantStatus::Active, TenantStatus::Deleted).await.unwrap();

        for to in TenantStatus::ALL {
            assert!(registry.update_status(tenant.id, TenantStatus::Deleted, to).await.is_err());
        }
        // the row is retained for audit
        assert_eq!(registry.get_by_slug("acme").await.unwrap().status, TenantStatus::Deleted);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let registry = registry();
        let a = registry.create("acme", Map::new()).await.unwrap();
        registry.create("techcorp", Map::new()).await.unwrap();
        registry.update_status(a.id, TenantStatus::Provisioning, TenantStatus::Active).await.unwrap();

        assert_eq!(registry.list(None).await.unwrap().len(), 2);
        let active = registry.list(Some(TenantStatus::Active)).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].slug, "acme");
    }

    #[tokio::test]
    async fn settings_are_replaceable() {
        let registry = registry();
        let tenant = registry.create("acme", Map::new()).await.unwrap();
        let mut settings = Map::new();
        settings.insert("theme".to_string(), Value::String("dark".to_string()));

        let updated = registry.update_settings(tenant.id, settings).await.unwrap();
        assert_eq!(updated.settings["theme"], "dark");
        assert_eq!(updated.status, TenantStatus::Provisioning);
    }
}
