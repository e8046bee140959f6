//! The write path: claim a name, upload its code, record its policies and
//! tag it with its owner.
//!
//! The registry and the relational store share no transaction. Once the
//! upload succeeds the script is live and is not rolled back. A policy write
//! that fails fails the publish; a tag write that fails is logged, reported
//! in the receipt and handed to the [`RepairQueue`].

mod repair;

pub use repair::{RepairConfig, RepairQueue, RepairTask};

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::claim::{NameLocks, check_claim};
use crate::error::{Error, Result};
use crate::registry::NamespaceRegistry;
use crate::store::Store;
use crate::types::{OutboundPolicy, OwnershipTagSet, ResourceLimits, ResourcePolicy, Tenant};

#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub script_name: String,
    pub content: Bytes,
    pub limits: ResourceLimits,
    pub outbound: Option<String>,
}

/// Post-upload steps that may be deferred to the repair queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStep {
    OwnershipTags,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    pub status: &'static str,
    pub script_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<PublishStep>,
}

pub struct Publisher {
    store: Arc<dyn Store>,
    registry: Arc<dyn NamespaceRegistry>,
    locks: NameLocks,
    repairs: Option<RepairQueue>,
}

impl Publisher {
    pub fn new(store: Arc<dyn Store>, registry: Arc<dyn NamespaceRegistry>, locks: NameLocks) -> Self {
        Self {
            store,
            registry,
            locks,
            repairs: None,
        }
    }

    #[must_use]
    pub fn with_repairs(mut self, repairs: RepairQueue) -> Self {
        self.repairs = Some(repairs);
        self
    }

    #[must_use]
    pub fn repairs(&self) -> Option<&RepairQueue> {
        self.repairs.as_ref()
    }

    pub async fn publish(&self, tenant: &Tenant, request: PublishRequest) -> Result<PublishReceipt> {
        let name = request.script_name.as_str();

        // Held from the claim check through the tag write.
        let _guard = self.locks.acquire(name).await;

        let decision = check_claim(self.registry.as_ref(), name, tenant).await?;
        if !decision.is_allowed() {
            tracing::info!(script = name, tenant = %tenant.id, "Claim denied: name already reserved");
            return Err(Error::NameReserved);
        }

        self.registry.put_script(name, request.content).await?;

        let epoch = self.repairs.as_ref().map(|r| r.begin(name));
        let persisted = self.persist_policies(name, request.limits, request.outbound);

        // Tags are written even when the policies failed, so the owner keeps
        // the name and can retry.
        let mut deferred = Vec::new();
        let tags = OwnershipTagSet::for_owner(tenant);
        if let Err(e) = self.registry.put_tags(name, &tags).await {
            tracing::error!(
                script = name,
                tenant = %tenant.id,
                "Script published but ownership tags were not written: {e}"
            );
            self.defer(
                epoch,
                RepairTask {
                    script_name: name.to_string(),
                    tenant: tenant.clone(),
                },
            );
            deferred.push(PublishStep::OwnershipTags);
        }

        if let Err(e) = persisted {
            tracing::error!(
                script = name,
                tenant = %tenant.id,
                "Script uploaded but its dispatch policies were not saved: {e}"
            );
            return Err(e);
        }

        tracing::info!(script = name, tenant = %tenant.id, "Script published");

        Ok(PublishReceipt {
            status: "published",
            script_name: name.to_string(),
            deferred,
        })
    }

    /// Writes the limits and outbound binding. Empty values store nothing.
    fn persist_policies(
        &self,
        name: &str,
        limits: ResourceLimits,
        outbound: Option<String>,
    ) -> Result<()> {
        let limits = limits.normalized();
        if !limits.is_empty() {
            self.store.upsert_resource_policy(&ResourcePolicy {
                script_name: name.to_string(),
                limits,
            })?;
        }

        if let Some(outbound) = outbound.filter(|o| !o.is_empty()) {
            self.store.upsert_outbound_policy(&OutboundPolicy {
                script_name: name.to_string(),
                outbound_script_name: outbound,
            })?;
        }
        Ok(())
    }

    fn defer(&self, epoch: Option<u64>, task: RepairTask) {
        if let (Some(repairs), Some(epoch)) = (&self.repairs, epoch) {
            repairs.enqueue(epoch, task);
        }
    }
}
