// handlers/mod.rs - Handlers grouped by access tier
//
// public    - no tenant, no auth (/health)
// protected - tenant-scoped, behind tenant resolution (/api/tenant/*)
// elevated  - operator administration of the registry (/api/root/*)

pub mod elevated;
pub mod protected;
pub mod public;
