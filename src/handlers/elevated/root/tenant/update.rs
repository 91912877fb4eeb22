// handlers/elevated/root/tenant/update.rs - PATCH /api/root/tenant/:slug handler

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{Map, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::tenancy::Tenant;

/// Replaces the tenant's settings object. Status changes go through the
/// dedicated lifecycle routes, never through this one.
pub async fn tenant_update(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(settings): Json<Map<String, Value>>,
) -> ApiResult<Tenant> {
    let tenant = state.tenants.update_settings(&slug, settings).await?;
    Ok(ApiResponse::success(tenant))
}
