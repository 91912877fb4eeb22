// handlers/elevated/root/tenant/activate.rs - POST /api/root/tenant/:slug/activate handler

use axum::extract::{Path, State};

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::tenancy::Tenant;

/// suspended -> active
pub async fn tenant_activate(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Tenant> {
    let tenant = state.tenants.activate(&slug).await?;
    tracing::info!("Reactivated tenant '{}'", tenant.slug);
    Ok(ApiResponse::success(tenant))
}
