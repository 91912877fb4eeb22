// HTTP API Error Types
use axum::{response::IntoResponse, http::StatusCode, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::tenancy::TenantStatus;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 403 Forbidden: tenant exists but its status refuses requests
    TenantNotActive {
        message: String,
        status: TenantStatus,
    },

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::TenantNotActive { .. } => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::TenantNotActive { message, .. } => message,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        });

        match self {
            ApiError::ValidationError { field_errors: Some(field_errors), .. } => {
                response["field_errors"] = json!(field_errors);
            }
            ApiError::TenantNotActive { status, .. } => {
                response["tenant_status"] = json!(status);
            }
            _ => {}
        }

        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::TenantNotActive { .. } => "TENANT_NOT_ACTIVE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::tenancy::TenantError> for ApiError {
    fn from(err: crate::tenancy::TenantError) -> Self {
        use crate::tenancy::TenantError;

        match err {
            TenantError::Resolution(msg) => ApiError::bad_request(msg),
            TenantError::InvalidSlug(msg) => {
                let mut field_errors = HashMap::new();
                field_errors.insert("slug".to_string(), msg);
                ApiError::validation_error("Invalid tenant slug", Some(field_errors))
            }
            TenantError::NotFound(key) => ApiError::not_found(format!("Tenant '{}' not found", key)),
            TenantError::NotActive { slug, status } => ApiError::TenantNotActive {
                message: format!("Tenant '{}' is not active", slug),
                status,
            },
            TenantError::SlugConflict(slug) => ApiError::conflict(format!("Tenant slug '{}' is already taken", slug)),
            err @ TenantError::InvalidTransition { .. } => ApiError::conflict(err.to_string()),
            TenantError::SchemaOperation(msg) => {
                tracing::error!("Schema operation failed: {}", msg);
                ApiError::internal_server_error("Tenant namespace operation failed")
            }
            TenantError::ContextNotSet => {
                // Reaching this means a tenant-scoped path skipped the resolution middleware
                tracing::error!("Tenant-scoped operation attempted without tenant context");
                ApiError::internal_server_error("Tenant context missing")
            }
            TenantError::InvalidIdentifier(name) => {
                tracing::error!("Rejected unsafe namespace identifier: {}", name);
                ApiError::internal_server_error("Invalid tenant namespace")
            }
            TenantError::UnknownStatus(status) => {
                tracing::error!("Tenant registry holds unknown status '{}'", status);
                ApiError::internal_server_error("Corrupt tenant record")
            }
            TenantError::Catalog(msg) => {
                tracing::error!("Table catalog error: {}", msg);
                ApiError::internal_server_error("Invalid table catalog")
            }
            TenantError::Database(sqlx::Error::PoolTimedOut) => {
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            TenantError::Database(e) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", e);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<crate::database::DatabaseError> for ApiError {
    fn from(err: crate::database::DatabaseError) -> Self {
        match err {
            crate::database::DatabaseError::ConfigMissing(_) | crate::database::DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database configuration error: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            crate::database::DatabaseError::Sqlx(sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
