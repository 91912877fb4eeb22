use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::database::TenantRegistry;
use crate::error::ApiError;
use crate::tenancy::{validate_slug, Tenant, TenantContext, TenantError, TenantId};

/// Longest header value considered for lookup
const MAX_TENANT_KEY_LEN: usize = 64;

/// How a request names its tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantKey {
    Id(TenantId),
    Slug(String),
}

impl TenantKey {
    pub fn parse(raw: &str) -> Result<Self, TenantError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TenantError::Resolution("tenant header is empty".to_string()));
        }
        if raw.len() > MAX_TENANT_KEY_LEN {
            return Err(TenantError::Resolution("tenant header is too long".to_string()));
        }
        if let Ok(id) = Uuid::parse_str(raw) {
            return Ok(TenantKey::Id(TenantId(id)));
        }
        validate_slug(raw)
            .map(|_| TenantKey::Slug(raw.to_string()))
            .map_err(|_| TenantError::Resolution("tenant header is not a valid slug or id".to_string()))
    }
}

/// Tenant validated by the middleware, available to handlers as an extension
#[derive(Debug, Clone)]
pub struct ResolvedTenant(pub Tenant);

/// State for `tenant_resolution_middleware`
#[derive(Clone)]
pub struct TenantResolver {
    registry: Arc<dyn TenantRegistry>,
    header: HeaderName,
}

impl TenantResolver {
    pub fn new(registry: Arc<dyn TenantRegistry>, header: HeaderName) -> Self {
        Self { registry, header }
    }

    /// Exactly one header value, parsed as a slug or id. No fallback tenant.
    pub fn tenant_key(&self, headers: &HeaderMap) -> Result<TenantKey, TenantError> {
        let mut values = headers.get_all(&self.header).iter();
        let value = values
            .next()
            .ok_or_else(|| TenantError::Resolution(format!("missing {} header", self.header)))?;
        if values.next().is_some() {
            return Err(TenantError::Resolution(format!("multiple {} headers", self.header)));
        }

        let raw = value
            .to_str()
            .map_err(|_| TenantError::Resolution(format!("{} header is not valid text", self.header)))?;
        TenantKey::parse(raw)
    }

    /// Look the tenant up and require it to be active
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Tenant, TenantError> {
        let tenant = match self.tenant_key(headers)? {
            TenantKey::Id(id) => self.registry.get_by_id(id).await?,
            TenantKey::Slug(slug) => self.registry.get_by_slug(&slug).await?,
        };
        tenant.ensure_active()?;
        Ok(tenant)
    }
}

/// Resolves the tenant for every request and runs the rest of the stack with
/// the tenant context set. The context is cleared when the inner future
/// finishes or is dropped, so cancelled requests do not leave it behind.
pub async fn tenant_resolution_middleware(
    State(resolver): State<TenantResolver>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let tenant = resolver.resolve(request.headers()).await.map_err(|e| {
        tracing::warn!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
        ApiError::from(e)
    })?;

    tracing::debug!("Resolved tenant '{}' ({})", tenant.slug, tenant.id);

    let tenant_id = tenant.id;
    request.extensions_mut().insert(ResolvedTenant(tenant));

    Ok(TenantContext::run_as(tenant_id, next.run(request)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryTenantRegistry;
    use crate::tenancy::{require_tenant_context, TenantStatus};
    use crate::testing::TestContext;
    use axum::{body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn echo_tenant() -> Result<String, ApiError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(require_tenant_context()?.to_string())
    }

    async fn registry_with(tenants: &[(&str, TenantStatus)]) -> (Arc<MemoryTenantRegistry>, Vec<Tenant>) {
        let ctx = TestContext::new();
        let mut created = Vec::new();
        for (slug, status) in tenants {
            created.push(ctx.tenant_in(slug, *status).await.unwrap());
        }
        (ctx.registry, created)
    }

    fn app(registry: Arc<MemoryTenantRegistry>) -> Router {
        let resolver = TenantResolver::new(registry, HeaderName::from_static("x-tenant-id"));
        Router::new()
            .route("/probe", get(echo_tenant))
            .layer(from_fn_with_state(resolver, tenant_resolution_middleware))
    }

    fn request(tenant: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/probe");
        if let Some(tenant) = tenant {
            builder = builder.header("X-Tenant-ID", tenant);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn parses_tenant_keys() {
        assert_eq!(TenantKey::parse(" acme ").unwrap(), TenantKey::Slug("acme".to_string()));

        let id = TenantId::new();
        assert_eq!(TenantKey::parse(&id.to_string()).unwrap(), TenantKey::Id(id));

        for bad in ["", "   ", "ACME", "acme'; --", "tenant_acme", &"a".repeat(65)] {
            assert!(matches!(TenantKey::parse(bad), Err(TenantError::Resolution(_))), "{:?}", bad);
        }
    }

    #[tokio::test]
    async fn missing_header_is_rejected_before_the_handler_runs() {
        let (registry, _) = registry_with(&[("acme", TenantStatus::Active)]).await;
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let resolver = TenantResolver::new(registry, HeaderName::from_static("x-tenant-id"));
        let app = Router::new()
            .route(
                "/probe",
                get(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        "reached"
                    }
                }),
            )
            .layer(from_fn_with_state(resolver, tenant_resolution_middleware));

        let response = app.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_header_is_bad_request() {
        let (registry, _) = registry_with(&[("acme", TenantStatus::Active)]).await;
        let response = app(registry).oneshot(request(Some("not a tenant!"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_tenant_is_not_found() {
        let (registry, _) = registry_with(&[("acme", TenantStatus::Active)]).await;
        let response = app(registry).oneshot(request(Some("globex"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn inactive_tenants_are_rejected_with_their_status() {
        let (registry, _) = registry_with(&[
            ("techcorp", TenantStatus::Suspended),
            ("initech", TenantStatus::Provisioning),
            ("globex", TenantStatus::Deleted),
        ])
        .await;

        for (slug, status) in [("techcorp", "suspended"), ("initech", "provisioning"), ("globex", "deleted")] {
            let response = app(registry.clone()).oneshot(request(Some(slug))).await.unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            let body = body_json(response).await;
            assert_eq!(body["code"], "TENANT_NOT_ACTIVE");
            assert_eq!(body["tenant_status"], status);
        }
    }

    #[tokio::test]
    async fn active_tenant_is_visible_to_the_handler_by_slug_or_id() {
        let (registry, tenants) = registry_with(&[("acme", TenantStatus::Active)]).await;
        let acme = &tenants[0];

        let response = app(registry.clone()).oneshot(request(Some("acme"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, acme.id.to_string());

        let response = app(registry).oneshot(request(Some(&acme.id.to_string()))).await.unwrap();
        assert_eq!(body_text(response).await, acme.id.to_string());

        // nothing lingers once the request is done
        assert!(TenantContext::get().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_each_see_their_own_tenant() {
        let slugs: Vec<String> = (0..16).map(|i| format!("tenant-{}", i)).collect();
        let spec: Vec<(&str, TenantStatus)> = slugs.iter().map(|s| (s.as_str(), TenantStatus::Active)).collect();
        let (registry, tenants) = registry_with(&spec).await;
        let app = app(registry);

        let requests = tenants.iter().map(|tenant| {
            let app = app.clone();
            let slug = tenant.slug.clone();
            let expected = tenant.id.to_string();
            tokio::spawn(async move {
                let response = app.oneshot(request(Some(&slug))).await.unwrap();
                (body_text(response).await, expected)
            })
        });

        for result in futures::future::join_all(requests).await {
            let (seen, expected) = result.unwrap();
            assert_eq!(seen, expected);
        }
    }

    #[tokio::test]
    async fn handlers_without_middleware_fail_loudly() {
        let app = Router::new().route("/probe", get(echo_tenant));
        let response = app.oneshot(request(Some("acme"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
