// handlers/protected/mod.rs - Tenant-scoped handlers
//
// Every route in this tier is mounted behind `tenant_resolution_middleware`,
// so handlers run with the tenant context set and bind their sessions through
// `ConnectionScopeBinder`.

pub mod tenant;
