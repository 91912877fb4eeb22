// handlers/elevated/root/tenant/list.rs - GET /api/root/tenant handler

use axum::extract::{Query, State};
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::tenancy::{Tenant, TenantStatus};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Only tenants in this status, e.g. `?status=provisioning`
    pub status: Option<String>,
}

pub async fn tenant_list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<Vec<Tenant>> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<TenantStatus>())
        .transpose()
        .map_err(|_| ApiError::bad_request(format!("unknown tenant status filter: {:?}", query.status)))?;

    let tenants = state.registry.list(status).await?;
    Ok(ApiResponse::success(tenants))
}
