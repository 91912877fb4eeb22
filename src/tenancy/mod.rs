// Tenant model, namespace naming and the request-scoped tenant context.
// Storage-facing pieces (registry, provisioner, binder) live in `crate::database`.

pub mod context;
pub mod error;
pub mod models;
pub mod namespace;

pub use context::{require_tenant_context, ContextGuard, TenantContext};
pub use error::TenantError;
pub use models::{validate_slug, Tenant, TenantId, TenantStatus};
pub use namespace::{NamespaceName, SHARED_NAMESPACE};
