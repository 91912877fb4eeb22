// handlers/elevated/root/tenant/delete.rs - DELETE /api/root/tenant/:slug handler

use axum::extract::{Path, State};

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::tenancy::Tenant;

/// Marks the tenant `deleted` and drops its namespace with all its data.
/// The registry row stays so the slug and namespace are never reused.
pub async fn tenant_delete(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Tenant> {
    let tenant = state.tenants.deprovision(&slug).await?;
    tracing::warn!("Deprovisioned tenant '{}', namespace {} dropped", tenant.slug, tenant.namespace_name);
    Ok(ApiResponse::success(tenant))
}
