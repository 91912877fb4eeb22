// handlers/elevated/root/tenant/suspend.rs - POST /api/root/tenant/:slug/suspend handler

use axum::extract::{Path, State};

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::tenancy::Tenant;

/// active -> suspended. Requests for the tenant are refused from now on;
/// its namespace and data stay in place.
pub async fn tenant_suspend(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Tenant> {
    let tenant = state.tenants.suspend(&slug).await?;
    tracing::info!("Suspended tenant '{}'", tenant.slug);
    Ok(ApiResponse::success(tenant))
}
