// Request-scoped tenant context
//
// The current tenant lives in a tokio task-local slot, so two requests
// handled concurrently on the same worker threads never see each other's
// tenant. The slot only exists inside `TenantContext::scope`/`run_as`;
// outside of one, `get` reports `ContextNotSet`.

use std::cell::Cell;
use std::future::Future;

use super::error::TenantError;
use super::models::TenantId;

tokio::task_local! {
    static CURRENT_TENANT: Cell<Option<TenantId>>;
}

/// Ambient holder of the current tenant identifier
#[derive(Debug, Clone, Copy)]
pub struct TenantContext;

impl TenantContext {
    /// Run `f` with an empty tenant slot that `set`/`clear` can write to
    pub async fn scope<F>(f: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT.scope(Cell::new(None), f).await
    }

    /// Run `f` with `tenant_id` set. The slot is cleared when `f` completes,
    /// fails, panics or is dropped before completion.
    pub async fn run_as<F>(tenant_id: TenantId, f: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT
            .scope(Cell::new(Some(tenant_id)), async move {
                let _guard = ContextGuard::armed();
                f.await
            })
            .await
    }

    /// Set the tenant for the enclosing scope
    pub fn set(tenant_id: TenantId) -> Result<(), TenantError> {
        CURRENT_TENANT
            .try_with(|slot| slot.set(Some(tenant_id)))
            .map_err(|_| TenantError::ContextNotSet)
    }

    /// Current tenant, or `ContextNotSet`
    pub fn get() -> Result<TenantId, TenantError> {
        CURRENT_TENANT
            .try_with(|slot| slot.get())
            .ok()
            .flatten()
            .ok_or(TenantError::ContextNotSet)
    }

    /// Current tenant without the error, for logging
    pub fn try_get() -> Option<TenantId> {
        Self::get().ok()
    }

    pub fn clear() {
        // Outside a scope there is nothing to clear.
        let _ = CURRENT_TENANT.try_with(|slot| slot.set(None));
    }

    /// Set the tenant and return a guard that clears it on drop
    pub fn enter(tenant_id: TenantId) -> Result<ContextGuard, TenantError> {
        Self::set(tenant_id)?;
        Ok(ContextGuard::armed())
    }

    /// Carry the current tenant into a future that will run on another task.
    /// Task-locals do not follow `tokio::spawn`.
    pub fn propagate<F>(f: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let current = Self::try_get();
        CURRENT_TENANT.scope(Cell::new(current), f)
    }
}

/// Clears the tenant slot when dropped
#[derive(Debug)]
#[must_use = "the tenant context is cleared as soon as the guard is dropped"]
pub struct ContextGuard {
    _private: (),
}

impl ContextGuard {
    fn armed() -> Self {
        ContextGuard { _private: () }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        TenantContext::clear();
    }
}

/// Tenant identifier for the current request.
///
/// A missing context means a code path skipped the resolution middleware;
/// callers must fail the request rather than fall back to any namespace.
pub fn require_tenant_context() -> Result<TenantId, TenantError> {
    TenantContext::get().map_err(|e| {
        tracing::error!("Tenant-scoped code ran without a tenant context");
        e
    })
}
