// Session-to-namespace binding
//
// Every storage session used on behalf of a tenant goes through
// `ConnectionScopeBinder` before its first query. The binder reads the tenant
// from the task-local context, resolves the namespace (short-TTL cache, then
// the registry) and points the session's search_path at it.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::RwLock;
use tracing::debug;

use super::registry::TenantRegistry;
use crate::tenancy::{require_tenant_context, NamespaceName, TenantError, TenantId, TenantStatus};

/// What the binder needs to know about a tenant
#[derive(Debug, Clone)]
pub struct NamespaceBinding {
    pub tenant_id: TenantId,
    pub slug: String,
    pub namespace: NamespaceName,
    pub status: TenantStatus,
}

#[derive(Debug, Clone)]
struct CachedBinding {
    binding: NamespaceBinding,
    cached_at: Instant,
}

/// Short-lived cache of tenant namespaces, invalidated on status changes.
///
/// Each tenant carries a generation bumped by `invalidate`. A fill records
/// the generation it started from and is dropped if an invalidation landed
/// while it was reading the registry.
#[derive(Debug)]
pub struct NamespaceCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<TenantId, CachedBinding>,
    generations: HashMap<TenantId, u64>,
}

impl NamespaceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub async fn get(&self, tenant_id: TenantId) -> Option<NamespaceBinding> {
        {
            let state = self.state.read().await;
            match state.entries.get(&tenant_id) {
                None => return None,
                Some(entry) if entry.cached_at.elapsed() < self.ttl => return Some(entry.binding.clone()),
                Some(_) => {}
            }
        }

        let mut state = self.state.write().await;
        if state
            .entries
            .get(&tenant_id)
            .is_some_and(|entry| entry.cached_at.elapsed() >= self.ttl)
        {
            state.entries.remove(&tenant_id);
        }
        None
    }

    /// Generation to pass to `insert` for a fill that starts now
    pub async fn generation(&self, tenant_id: TenantId) -> u64 {
        self.state.read().await.generations.get(&tenant_id).copied().unwrap_or(0)
    }

    /// Store a binding read from the registry, unless the tenant was
    /// invalidated since `generation` was taken
    pub async fn insert(&self, binding: NamespaceBinding, generation: u64) {
        if self.ttl.is_zero() {
            return;
        }
        let mut state = self.state.write().await;
        let ttl = self.ttl;
        state.entries.retain(|_, entry| entry.cached_at.elapsed() < ttl);

        if state.generations.get(&binding.tenant_id).copied().unwrap_or(0) != generation {
            debug!("Discarding stale namespace binding for tenant '{}'", binding.slug);
            return;
        }
        state.entries.insert(
            binding.tenant_id,
            CachedBinding {
                binding,
                cached_at: Instant::now(),
            },
        );
    }

    pub async fn invalidate(&self, tenant_id: TenantId) {
        let mut state = self.state.write().await;
        state.entries.remove(&tenant_id);
        *state.generations.entry(tenant_id).or_insert(0) += 1;
    }

    /// Number of entries held, expired ones included until swept
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

/// A pooled session bound to one tenant's namespace.
///
/// Derefs to `PgConnection`, so it is used like any other executor:
/// `sqlx::query(..).execute(&mut *session)`.
pub struct TenantSession {
    conn: PoolConnection<Postgres>,
    binding: NamespaceBinding,
}

impl TenantSession {
    pub fn tenant_id(&self) -> TenantId {
        self.binding.tenant_id
    }

    pub fn namespace(&self) -> &NamespaceName {
        &self.binding.namespace
    }
}

impl Deref for TenantSession {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        &self.conn
    }
}

impl DerefMut for TenantSession {
    fn deref_mut(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

/// Binds storage sessions to the namespace of the tenant in `TenantContext`
#[derive(Clone)]
pub struct ConnectionScopeBinder {
    pool: PgPool,
    registry: Arc<dyn TenantRegistry>,
    cache: Arc<NamespaceCache>,
    namespace_prefix: String,
}

impl ConnectionScopeBinder {
    pub fn new(
        pool: PgPool,
        registry: Arc<dyn TenantRegistry>,
        cache: Arc<NamespaceCache>,
        namespace_prefix: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            registry,
            cache,
            namespace_prefix: namespace_prefix.into(),
        }
    }

    pub fn cache(&self) -> &Arc<NamespaceCache> {
        &self.cache
    }

    /// Namespace of the tenant in the current context, checked to be active.
    /// Fails with `ContextNotSet` before any storage is touched.
    pub async fn resolve(&self) -> Result<NamespaceBinding, TenantError> {
        let tenant_id = require_tenant_context()?;

        let binding = match self.cache.get(tenant_id).await {
            Some(binding) => binding,
            None => {
                let generation = self.cache.generation(tenant_id).await;
                let tenant = self.registry.get_by_id(tenant_id).await?;
                let binding = NamespaceBinding {
                    tenant_id,
                    slug: tenant.slug,
                    namespace: tenant.namespace_name,
                    status: tenant.status,
                };
                self.cache.insert(binding.clone(), generation).await;
                binding
            }
        };

        if binding.status != TenantStatus::Active {
            return Err(TenantError::NotActive {
                slug: binding.slug,
                status: binding.status,
            });
        }

        Ok(binding)
    }

    /// Namespace the current request's sessions are bound to
    pub async fn current_namespace(&self) -> Result<NamespaceName, TenantError> {
        Ok(self.resolve().await?.namespace)
    }

    /// Bind a session supplied by the caller. Session-level: the binding
    /// lasts until the connection is released back to the pool.
    pub async fn bind(&self, conn: &mut PgConnection) -> Result<NamespaceBinding, TenantError> {
        let binding = self.resolve().await?;
        self.apply(conn, &binding, false).await?;
        Ok(binding)
    }

    /// Acquire a new pooled session bound to the current tenant
    pub async fn acquire(&self) -> Result<TenantSession, TenantError> {
        let binding = self.resolve().await?;
        let mut conn = self.pool.acquire().await?;
        self.apply(&mut conn, &binding, false).await?;
        Ok(TenantSession { conn, binding })
    }

    /// Begin a transaction bound to the current tenant for its duration only
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, TenantError> {
        let binding = self.resolve().await?;
        let mut tx = self.pool.begin().await?;
        self.apply(&mut tx, &binding, true).await?;
        Ok(tx)
    }

    async fn apply(&self, conn: &mut PgConnection, binding: &NamespaceBinding, local: bool) -> Result<(), TenantError> {
        let search_path = binding.namespace.search_path(&self.namespace_prefix)?;

        sqlx::query("SELECT set_config('search_path', $1, $2)")
            .bind(&search_path)
            .bind(local)
            .execute(conn)
            .await?;

        debug!(
            "Bound session to namespace {} for tenant '{}'",
            binding.namespace, binding.slug
        );
        Ok(())
    }
}
