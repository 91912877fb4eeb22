use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub tenancy: TenancyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Request header carrying the tenant slug or id
    pub header_name: String,
    /// Prefix of every tenant namespace, e.g. `tenant_acme`
    pub namespace_prefix: String,
    /// Upper bound for one background provisioning run
    pub provision_timeout_secs: u64,
    /// Lifetime of a cached namespace lookup in the session binder
    pub namespace_cache_ttl_secs: u64,
    /// YAML table catalog; the built-in portal catalog is used when unset
    pub table_catalog_path: Option<String>,
    /// Re-run provisioning for tenants left in `provisioning` at startup
    pub resume_pending_on_start: bool,
}

impl TenancyConfig {
    pub fn provision_timeout(&self) -> Duration {
        Duration::from_secs(self.provision_timeout_secs)
    }

    pub fn namespace_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.namespace_cache_ttl_secs)
    }
}

pub const DEFAULT_DATABASE_URL: &str = "postgres://postgres@localhost:5432/portal";
pub const DEFAULT_TENANT_HEADER: &str = "x-tenant-id";
pub const DEFAULT_NAMESPACE_PREFIX: &str = "tenant_";

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Some(v) = env::var("PORTAL_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_ENABLE_CORS") {
            self.api.enable_cors = v.parse().unwrap_or(self.api.enable_cors);
        }

        // Tenancy overrides
        if let Ok(v) = env::var("TENANCY_HEADER_NAME") {
            self.tenancy.header_name = v.to_ascii_lowercase();
        }
        if let Ok(v) = env::var("TENANCY_NAMESPACE_PREFIX") {
            self.tenancy.namespace_prefix = v;
        }
        if let Ok(v) = env::var("TENANCY_PROVISION_TIMEOUT_SECS") {
            self.tenancy.provision_timeout_secs = v.parse().unwrap_or(self.tenancy.provision_timeout_secs);
        }
        if let Ok(v) = env::var("TENANCY_NAMESPACE_CACHE_TTL_SECS") {
            self.tenancy.namespace_cache_ttl_secs = v.parse().unwrap_or(self.tenancy.namespace_cache_ttl_secs);
        }
        if let Ok(v) = env::var("TENANCY_TABLE_CATALOG") {
            self.tenancy.table_catalog_path = Some(v).filter(|p| !p.is_empty());
        }
        if let Ok(v) = env::var("TENANCY_RESUME_PENDING_ON_START") {
            self.tenancy.resume_pending_on_start = v.parse().unwrap_or(self.tenancy.resume_pending_on_start);
        }

        self
    }

    fn tenancy_defaults() -> TenancyConfig {
        TenancyConfig {
            header_name: DEFAULT_TENANT_HEADER.to_string(),
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            provision_timeout_secs: 30,
            namespace_cache_ttl_secs: 5,
            table_catalog_path: None,
            resume_pending_on_start: true,
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                enable_cors: true,
            },
            tenancy: Self::tenancy_defaults(),
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                enable_cors: true,
            },
            tenancy: TenancyConfig {
                provision_timeout_secs: 60,
                ..Self::tenancy_defaults()
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                enable_cors: false,
            },
            tenancy: TenancyConfig {
                provision_timeout_secs: 120,
                namespace_cache_ttl_secs: 2,
                ..Self::tenancy_defaults()
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
