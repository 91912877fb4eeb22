// handlers/elevated/root/tenant/create.rs - POST /api/root/tenant handler

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::tenancy::Tenant;

/// Expected Input:
/// ```json
/// { "slug": "acme", "settings": { "plan": "pro" } }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub slug: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

/// Registers the tenant and answers 202 while the namespace is provisioned
/// in the background. The returned tenant is still `provisioning`; poll
/// `GET /api/root/tenant/:slug` until it turns `active`.
pub async fn tenant_create(
    State(state): State<AppState>,
    Json(request): Json<CreateTenantRequest>,
) -> ApiResult<Tenant> {
    let tenant = state.tenants.create_tenant(&request.slug, request.settings).await?;
    tracing::info!("Registered tenant '{}' ({}), provisioning started", tenant.slug, tenant.id);
    Ok(ApiResponse::accepted(tenant))
}
