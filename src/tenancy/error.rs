use thiserror::Error;

use super::models::TenantStatus;

/// Errors raised by the tenancy layer (registry, provisioner, context, binder)
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Tenant resolution failed: {0}")]
    Resolution(String),

    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Tenant '{slug}' is not active (status: {status})")]
    NotActive { slug: String, status: TenantStatus },

    #[error("Tenant slug already in use: {0}")]
    SlugConflict(String),

    #[error("Invalid tenant slug: {0}")]
    InvalidSlug(String),

    #[error("Invalid status transition {from} -> {to} (current status: {current})")]
    InvalidTransition {
        from: TenantStatus,
        to: TenantStatus,
        current: TenantStatus,
    },

    #[error("Schema operation failed: {0}")]
    SchemaOperation(String),

    #[error("Tenant context is not set for this task")]
    ContextNotSet,

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Unknown tenant status '{0}'")]
    UnknownStatus(String),

    #[error("Invalid table catalog: {0}")]
    Catalog(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl TenantError {
    /// Shorthand for a transition attempted from the wrong stored status
    pub fn transition(from: TenantStatus, to: TenantStatus, current: TenantStatus) -> Self {
        TenantError::InvalidTransition { from, to, current }
    }

    /// True for failures the background provisioner may retry later
    pub fn is_retryable(&self) -> bool {
        matches!(self, TenantError::SchemaOperation(_) | TenantError::Database(_))
    }
}
