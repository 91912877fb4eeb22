// handlers/protected/tenant/mod.rs - Handlers about the calling tenant

pub mod whoami; // GET /api/tenant/whoami

pub use whoami::tenant_whoami;
