// handlers/elevated/root/tenant/provision.rs - POST /api/root/tenant/:slug/provision handler

use axum::extract::{Path, State};
use serde::Serialize;

use crate::database::ProvisionOutcome;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::tenancy::Tenant;

#[derive(Debug, Serialize)]
pub struct ProvisionResponse {
    pub tenant: Tenant,
    pub outcome: ProvisionOutcome,
}

/// Runs provisioning in the request, for retrying a tenant stuck in
/// `provisioning`. Idempotent on an already provisioned tenant.
pub async fn tenant_provision(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<ProvisionResponse> {
    let (tenant, outcome) = state.tenants.provision_now(&slug).await?;
    Ok(ApiResponse::success(ProvisionResponse { tenant, outcome }))
}
