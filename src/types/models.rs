use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer of the platform. Created by bootstrap, read on every
/// authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub display_name: String,
    pub plan_tier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantToken {
    /// SHA-256 hex digest of the raw token.
    #[serde(skip)]
    pub token_digest: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(rename = "cpuMs", skip_serializing_if = "Option::is_none")]
    pub cpu_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
}

impl ResourceLimits {
    /// Zero means "not set"; only positive limits are kept.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            cpu_ms: self.cpu_ms.filter(|v| *v > 0),
            memory: self.memory.filter(|v| *v > 0),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cpu_ms.is_none() && self.memory.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    pub script_name: String,
    #[serde(flatten)]
    pub limits: ResourceLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundPolicy {
    pub script_name: String,
    pub outbound_script_name: String,
}

/// Live view of a script entry in the namespace registry. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiScript {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}
