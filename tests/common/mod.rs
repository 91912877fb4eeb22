#![allow(dead_code)]

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use portal_tenancy::config::AppConfig;
use portal_tenancy::server::{router, AppState};
use portal_tenancy::tenancy::TenantId;
use reqwest::StatusCode;
use serde_json::{json, Value};

/// The API served in-process on a free port, backed by DATABASE_URL
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    pub config: AppConfig,
    pub client: reqwest::Client,
}

/// Start a server, or `None` when no database is configured so the
/// calling test can return early
pub async fn start() -> Result<Option<TestServer>> {
    let _ = dotenvy::dotenv();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()),
        ))
        .with_test_writer()
        .try_init();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database-backed test");
        return Ok(None);
    };

    let port = portpicker::pick_unused_port().context("failed to pick free port")?;

    let mut config = AppConfig::development();
    config.database.url = database_url;
    config.database.max_connections = 8;
    config.database.enable_query_logging = false;
    config.api.port = port;
    config.api.enable_request_logging = false;
    // other tests may have tenants mid-provisioning; leave them alone
    config.tenancy.resume_pending_on_start = false;

    let state = AppState::initialize(&config).await?;
    let app = router(state.clone(), &config);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let server = TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        state,
        config,
        client: reqwest::Client::new(),
    };
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(Some(server))
}

/// `<prefix>-<8 hex chars>`, unique per test run
pub fn unique_slug(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..8])
}

pub fn tenant_id(tenant: &Value) -> Result<TenantId> {
    let raw = tenant["id"].as_str().context("tenant has no id")?;
    Ok(raw.parse()?)
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    /// POST /api/root/tenant and return the registered tenant
    pub async fn create_tenant(&self, slug: &str) -> Result<Value> {
        let res = self
            .client
            .post(self.url("/api/root/tenant"))
            .json(&json!({ "slug": slug }))
            .send()
            .await?;
        let status = res.status();
        let body = res.json::<Value>().await?;
        anyhow::ensure!(status == StatusCode::ACCEPTED, "create {} returned {}: {}", slug, status, body);
        Ok(body["data"].clone())
    }

    pub async fn get_tenant(&self, slug: &str) -> Result<Value> {
        let body = self
            .client
            .get(self.url(&format!("/api/root/tenant/{}", slug)))
            .send()
            .await?
            .json::<Value>()
            .await?;
        Ok(body["data"].clone())
    }

    /// Poll until background provisioning has made the tenant active
    pub async fn wait_active(&self, slug: &str) -> Result<Value> {
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            let tenant = self.get_tenant(slug).await?;
            if tenant["status"] == "active" {
                return Ok(tenant);
            }
            anyhow::ensure!(
                Instant::now() < deadline,
                "tenant {} not active in time, last seen {}",
                slug,
                tenant
            );
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Register a uniquely named tenant and wait for it to become active
    pub async fn active_tenant(&self, prefix: &str) -> Result<Value> {
        let slug = unique_slug(prefix);
        self.create_tenant(&slug).await?;
        self.wait_active(&slug).await
    }

    pub async fn post_action(&self, slug: &str, action: &str) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .post(self.url(&format!("/api/root/tenant/{}/{}", slug, action)))
            .send()
            .await?;
        Ok((res.status(), res.json::<Value>().await?))
    }

    pub async fn delete_tenant(&self, slug: &str) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .delete(self.url(&format!("/api/root/tenant/{}", slug)))
            .send()
            .await?;
        Ok((res.status(), res.json::<Value>().await?))
    }

    /// GET /api/tenant/whoami as the given tenant
    pub async fn whoami(&self, tenant: &str) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .get(self.url("/api/tenant/whoami"))
            .header("X-Tenant-ID", tenant)
            .send()
            .await?;
        Ok((res.status(), res.json::<Value>().await?))
    }

    pub async fn schema_exists(&self, namespace: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
        )
        .bind(namespace)
        .fetch_one(&self.state.pool)
        .await?;
        Ok(exists)
    }

    /// Drop the tenant's namespace so test runs do not pile up schemas
    pub async fn cleanup(&self, slug: &str) {
        let _ = self.delete_tenant(slug).await;
    }
}
