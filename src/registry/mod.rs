//! Client side of the namespace registry: the external service that owns
//! script bytes and the free-form tags attached to each script name.
//!
//! The registry knows nothing about tenants. Ownership is layered on top by
//! [`crate::claim`] using the tag set.

mod http;
mod memory;

pub use http::HttpRegistry;
pub use memory::MemoryRegistry;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::types::{ApiScript, OwnershipTagSet, TagFilter};

#[async_trait]
pub trait NamespaceRegistry: Send + Sync {
    async fn list_scripts(&self) -> Result<Vec<ApiScript>>;

    async fn list_scripts_by_tags(&self, filters: &[TagFilter]) -> Result<Vec<ApiScript>>;

    /// Tags on a script. A script that was never uploaded has no tags.
    async fn get_tags(&self, name: &str) -> Result<OwnershipTagSet>;

    /// Creates or overwrites the script's code. A rejection carries the
    /// registry's body as `Error::UpstreamValidation`.
    async fn put_script(&self, name: &str, content: Bytes) -> Result<()>;

    /// Replaces the full tag set.
    async fn put_tags(&self, name: &str, tags: &OwnershipTagSet) -> Result<()>;

    async fn delete_script(&self, name: &str) -> Result<()>;
}
