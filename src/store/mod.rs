mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the relational interface: the customer directory and the
/// per-script resource policies.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    /// Drops and recreates every table.
    fn reset(&self) -> Result<()>;

    // Customer directory
    fn create_tenant(&self, tenant: &Tenant) -> Result<()>;
    fn get_tenant(&self, id: &str) -> Result<Option<Tenant>>;
    fn list_tenants(&self) -> Result<Vec<Tenant>>;
    fn create_tenant_token(&self, token: &TenantToken) -> Result<()>;
    fn get_tenant_by_token_digest(&self, digest: &str) -> Result<Option<Tenant>>;
    fn has_tenants(&self) -> Result<bool>;

    // Resource policies, keyed by script name
    fn upsert_resource_policy(&self, policy: &ResourcePolicy) -> Result<()>;
    fn get_resource_policy(&self, script_name: &str) -> Result<Option<ResourcePolicy>>;
    fn list_resource_policies(&self) -> Result<Vec<ResourcePolicy>>;

    // Outbound policies, keyed by script name
    fn upsert_outbound_policy(&self, policy: &OutboundPolicy) -> Result<()>;
    fn get_outbound_policy(&self, script_name: &str) -> Result<Option<OutboundPolicy>>;
    fn list_outbound_policies(&self) -> Result<Vec<OutboundPolicy>>;
}
