pub mod tenant_service;

pub use tenant_service::{TenantHealth, TenantService};
