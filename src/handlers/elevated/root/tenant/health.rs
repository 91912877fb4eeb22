// handlers/elevated/root/tenant/health.rs - GET /api/root/tenant/:slug/health handler

use axum::extract::{Path, State};

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::TenantHealth;

/// Compares the namespace on disk with the table catalog
pub async fn tenant_health(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<TenantHealth> {
    let health = state.tenants.health(&slug).await?;
    Ok(ApiResponse::success(health))
}
