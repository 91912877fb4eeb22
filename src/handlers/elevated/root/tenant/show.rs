// handlers/elevated/root/tenant/show.rs - GET /api/root/tenant/:slug handler

use axum::extract::{Path, State};

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::tenancy::Tenant;

pub async fn tenant_show(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Tenant> {
    let tenant = state.registry.get_by_slug(&slug).await?;
    Ok(ApiResponse::success(tenant))
}
