// handlers/elevated/root/tenant/mod.rs - Tenant management handlers
//
// Lifecycle: provisioning -> active <-> suspended -> deleted.
// Creation answers 202 and provisions in the background; the other
// transitions are synchronous.

pub mod activate;  // POST /api/root/tenant/:slug/activate
pub mod create;    // POST /api/root/tenant
pub mod delete;    // DELETE /api/root/tenant/:slug
pub mod health;    // GET /api/root/tenant/:slug/health
pub mod list;      // GET /api/root/tenant
pub mod provision; // POST /api/root/tenant/:slug/provision
pub mod show;      // GET /api/root/tenant/:slug
pub mod suspend;   // POST /api/root/tenant/:slug/suspend
pub mod update;    // PATCH /api/root/tenant/:slug

pub use activate::tenant_activate;
pub use create::tenant_create;
pub use delete::tenant_delete;
pub use health::tenant_health;
pub use list::tenant_list;
pub use provision::tenant_provision;
pub use show::tenant_show;
pub use suspend::tenant_suspend;
pub use update::tenant_update;
