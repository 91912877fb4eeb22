pub mod binder;
pub mod catalog;
pub mod manager;
pub mod memory;
pub mod provisioner;
pub mod registry;

pub use binder::{ConnectionScopeBinder, NamespaceBinding, NamespaceCache, TenantSession};
pub use catalog::{ColumnDefinition, ColumnType, TableCatalog, TableDefinition};
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryTenantRegistry;
pub use provisioner::{ProvisionOutcome, SchemaProvisioner};
pub use registry::{PgTenantRegistry, TenantRegistry};
