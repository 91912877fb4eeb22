pub mod response;
pub mod tenant;

pub use response::{ApiResponse, ApiResult};
pub use tenant::{tenant_resolution_middleware, ResolvedTenant, TenantKey, TenantResolver};
