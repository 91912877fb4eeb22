use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use crate::tenancy::{validate_slug, NamespaceName, Tenant, TenantError, TenantId, TenantStatus};

/// Durable record of every tenant and its lifecycle status.
///
/// Rows are never deleted; `deleted` is a terminal status. Status changes go
/// through `update_status`, which is a compare-and-set on the stored status.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    /// Register a tenant in `provisioning`. Fails with `SlugConflict` when the
    /// slug (or its namespace) was ever taken, including by deleted tenants.
    async fn create(&self, slug: &str, settings: Map<String, Value>) -> Result<Tenant, TenantError>;

    async fn get_by_id(&self, id: TenantId) -> Result<Tenant, TenantError>;

    async fn get_by_slug(&self, slug: &str) -> Result<Tenant, TenantError>;

    /// Move `id` from `from` to `to`. Fails with `InvalidTransition` when the
    /// edge is not in the state machine or the stored status is not `from`.
    async fn update_status(&self, id: TenantId, from: TenantStatus, to: TenantStatus) -> Result<Tenant, TenantError>;

    /// Replace the opaque settings blob
    async fn update_settings(&self, id: TenantId, settings: Map<String, Value>) -> Result<Tenant, TenantError>;

    /// Operator listing, oldest first
    async fn list(&self, status: Option<TenantStatus>) -> Result<Vec<Tenant>, TenantError>;
}

/// Validation shared by registry implementations before a row is written
pub(crate) fn prepare_new_tenant(prefix: &str, slug: &str) -> Result<NamespaceName, TenantError> {
    validate_slug(slug)?;
    NamespaceName::derive(prefix, slug)
}

/// Reject edges the state machine does not have, before touching storage
pub(crate) fn check_edge(from: TenantStatus, to: TenantStatus) -> Result<(), TenantError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(TenantError::transition(from, to, from))
    }
}

const TENANT_COLUMNS: &str = "id, slug, namespace_name, status, settings, created_at, updated_at";

#[derive(Debug, FromRow)]
struct TenantRow {
    id: Uuid,
    slug: String,
    namespace_name: String,
    status: String,
    settings: Json<Map<String, Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = TenantError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        Ok(Tenant {
            id: TenantId(row.id),
            slug: row.slug,
            namespace_name: NamespaceName::parse(&row.namespace_name)?,
            status: row.status.parse()?,
            settings: row.settings.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Advisory lock key guarding `migrate`
const MIGRATION_LOCK_KEY: i64 = 0x706f_7274_616c_7431;

/// Registry stored in `public.tenants`
#[derive(Clone)]
pub struct PgTenantRegistry {
    pool: PgPool,
    namespace_prefix: String,
}

impl PgTenantRegistry {
    pub fn new(pool: PgPool, namespace_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            namespace_prefix: namespace_prefix.into(),
        }
    }

    /// Create the shared registry table if it does not exist yet.
    /// Concurrent callers (several replicas booting at once) are serialized
    /// on an advisory lock held for the migration transaction.
    pub async fn migrate(&self) -> Result<(), TenantError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS public.tenants (
                id              UUID PRIMARY KEY,
                slug            TEXT NOT NULL UNIQUE,
                namespace_name  TEXT NOT NULL UNIQUE,
                status          TEXT NOT NULL
                                CHECK (status IN ('provisioning', 'active', 'suspended', 'deleted')),
                settings        JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS tenants_status_idx ON public.tenants (status)")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Tenant registry table ready");
        Ok(())
    }

    async fn fetch_optional(&self, id: TenantId) -> Result<Option<Tenant>, TenantError> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM public.tenants WHERE id = $1",
            TENANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Tenant::try_from).transpose()
    }
}

#[async_trait]
impl TenantRegistry for PgTenantRegistry {
    async fn create(&self, slug: &str, settings: Map<String, Value>) -> Result<Tenant, TenantError> {
        let namespace = prepare_new_tenant(&self.namespace_prefix, slug)?;

        // ON CONFLICT covers both unique columns, so a slug or namespace held
        // by any row (deleted ones included) is never handed out again.
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "INSERT INTO public.tenants (id, slug, namespace_name, status, settings)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT DO NOTHING
             RETURNING {}",
            TENANT_COLUMNS
        ))
        .bind(TenantId::new())
        .bind(slug)
        .bind(namespace.as_str())
        .bind(TenantStatus::Provisioning.as_str())
        .bind(Json(&settings))
        .fetch_optional(&self.pool)
        .await?;

        let tenant = row
            .ok_or_else(|| TenantError::SlugConflict(slug.to_string()))
            .and_then(Tenant::try_from)?;

        tracing::info!("Registered tenant '{}' ({}) in namespace {}", tenant.slug, tenant.id, tenant.namespace_name);
        Ok(tenant)
    }

    async fn get_by_id(&self, id: TenantId) -> Result<Tenant, TenantError> {
        self.fetch_optional(id)
            .await?
            .ok_or_else(|| TenantError::NotFound(id.to_string()))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Tenant, TenantError> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM public.tenants WHERE slug = $1",
            TENANT_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Tenant::try_from)
            .transpose()?
            .ok_or_else(|| TenantError::NotFound(slug.to_string()))
    }

    async fn update_status(&self, id: TenantId, from: TenantStatus, to: TenantStatus) -> Result<Tenant, TenantError> {
        check_edge(from, to)?;

        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "UPDATE public.tenants
             SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
             RETURNING {}",
            TENANT_COLUMNS
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let tenant = Tenant::try_from(row)?;
                tracing::info!("Tenant '{}' status {} -> {}", tenant.slug, from, to);
                Ok(tenant)
            }
            None => {
                // Lost the compare-and-set, or the tenant does not exist
                let current = self.get_by_id(id).await?;
                Err(TenantError::transition(from, to, current.status))
            }
        }
    }

    async fn update_settings(&self, id: TenantId, settings: Map<String, Value>) -> Result<Tenant, TenantError> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "UPDATE public.tenants SET settings = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            TENANT_COLUMNS
        ))
        .bind(id)
        .bind(Json(&settings))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Tenant::try_from)
            .transpose()?
            .ok_or_else(|| TenantError::NotFound(id.to_string()))
    }

    async fn list(&self, status: Option<TenantStatus>) -> Result<Vec<Tenant>, TenantError> {
        let rows = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM public.tenants
             WHERE $1::text IS NULL OR status = $1
             ORDER BY created_at, slug",
            TENANT_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Tenant::try_from).collect()
    }
}
