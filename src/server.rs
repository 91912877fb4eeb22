use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::HeaderName,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::database::{
    ConnectionScopeBinder, DatabaseManager, NamespaceCache, PgTenantRegistry, SchemaProvisioner, TableCatalog,
    TenantRegistry,
};
use crate::handlers::{elevated, protected, public};
use crate::middleware::{tenant_resolution_middleware, TenantResolver};
use crate::services::TenantService;

/// Shared handles for every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<dyn TenantRegistry>,
    pub binder: ConnectionScopeBinder,
    pub tenants: TenantService,
    pub resolver: TenantResolver,
}

impl AppState {
    /// Connect, prepare the registry and wire the tenancy components together
    pub async fn initialize(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = DatabaseManager::connect(&config.database)
            .await
            .context("failed to connect to the database")?;

        let tenancy = &config.tenancy;
        let registry = PgTenantRegistry::new(pool.clone(), tenancy.namespace_prefix.clone());
        registry.migrate().await.context("failed to prepare the tenant registry")?;
        let registry: Arc<dyn TenantRegistry> = Arc::new(registry);

        let catalog = TableCatalog::load_or_builtin(tenancy.table_catalog_path.as_deref())
            .context("failed to load the table catalog")?;
        tracing::info!("Tenant namespaces use {} catalog table(s)", catalog.tables.len());

        let header = HeaderName::try_from(tenancy.header_name.as_str())
            .with_context(|| format!("invalid tenant header name '{}'", tenancy.header_name))?;

        let cache = Arc::new(NamespaceCache::new(tenancy.namespace_cache_ttl()));
        let binder = ConnectionScopeBinder::new(
            pool.clone(),
            registry.clone(),
            cache.clone(),
            tenancy.namespace_prefix.clone(),
        );
        let provisioner = SchemaProvisioner::new(
            pool.clone(),
            registry.clone(),
            Arc::new(catalog),
            tenancy.namespace_prefix.clone(),
        );
        let tenants = TenantService::new(registry.clone(), provisioner, cache, tenancy.provision_timeout());
        let resolver = TenantResolver::new(registry.clone(), header);

        if tenancy.resume_pending_on_start {
            let resumed = tenants.resume_pending().await?;
            if resumed > 0 {
                tracing::info!("Resumed provisioning for {} tenant(s)", resumed);
            }
        }

        Ok(Self {
            pool,
            registry,
            binder,
            tenants,
            resolver,
        })
    }
}

pub fn router(state: AppState, config: &AppConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(public::health))
        .merge(root_routes())
        .merge(tenant_routes(state.resolver.clone()))
        .with_state(state);

    if config.api.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

/// Operator routes on the shared registry. Never tenant-scoped.
fn root_routes() -> Router<AppState> {
    use elevated::root::tenant;

    Router::new()
        .route("/api/root/tenant", post(tenant::tenant_create).get(tenant::tenant_list))
        .route(
            "/api/root/tenant/:slug",
            get(tenant::tenant_show)
                .patch(tenant::tenant_update)
                .delete(tenant::tenant_delete),
        )
        .route("/api/root/tenant/:slug/suspend", post(tenant::tenant_suspend))
        .route("/api/root/tenant/:slug/activate", post(tenant::tenant_activate))
        .route("/api/root/tenant/:slug/provision", post(tenant::tenant_provision))
        .route("/api/root/tenant/:slug/health", get(tenant::tenant_health))
}

/// Tenant-scoped routes; every request passes tenant resolution first
fn tenant_routes(resolver: TenantResolver) -> Router<AppState> {
    use protected::tenant;

    Router::new()
        .route("/api/tenant/whoami", get(tenant::tenant_whoami))
        .route_layer(from_fn_with_state(resolver, tenant_resolution_middleware))
}

/// Bind and serve until the process is stopped
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let state = AppState::initialize(config).await?;
    let app = router(state, config);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Portal tenancy API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
