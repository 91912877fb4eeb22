// handlers/protected/tenant/whoami.rs - GET /api/tenant/whoami handler

use axum::extract::{Extension, State};
use serde::Serialize;

use crate::middleware::{ApiResponse, ApiResult, ResolvedTenant};
use crate::server::AppState;
use crate::tenancy::{NamespaceName, TenantId, TenantStatus};

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub id: TenantId,
    pub slug: String,
    pub status: TenantStatus,
    pub namespace: NamespaceName,
    /// What the bound session itself reports, not what the registry says
    pub current_schema: String,
}

/// Reports the resolved tenant and the namespace a bound session lands in.
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "id": "6f1c...",
///     "slug": "acme",
///     "status": "active",
///     "namespace": "tenant_acme",
///     "current_schema": "tenant_acme"
///   }
/// }
/// ```
pub async fn tenant_whoami(
    State(state): State<AppState>,
    Extension(ResolvedTenant(tenant)): Extension<ResolvedTenant>,
) -> ApiResult<WhoAmI> {
    let mut session = state.binder.acquire().await?;
    let current_schema: String = sqlx::query_scalar("SELECT current_schema()::text")
        .fetch_one(&mut *session)
        .await
        .map_err(crate::tenancy::TenantError::from)?;

    Ok(ApiResponse::success(WhoAmI {
        id: tenant.id,
        slug: tenant.slug,
        status: tenant.status,
        namespace: session.namespace().clone(),
        current_schema,
    }))
}
