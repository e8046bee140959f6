use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the namespace registry REST API.
///
/// The API token is a process-wide credential; tenants never see it.
#[derive(Clone)]
pub struct RegistryConfig {
    pub api_base: String,
    pub account_id: String,
    pub namespace: String,
    pub api_token: String,
    pub timeout: Duration,
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(Error::Config("registry account id is empty".into()));
        }
        if self.namespace.trim().is_empty() {
            return Err(Error::Config("dispatch namespace name is empty".into()));
        }
        if self.api_token.trim().is_empty() {
            return Err(Error::Config("registry api token is empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("registry timeout must be positive".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn scripts_url(&self) -> String {
        format!(
            "{}/accounts/{}/workers/dispatch/namespaces/{}/scripts",
            self.api_base.trim_end_matches('/'),
            self.account_id,
            self.namespace
        )
    }
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("api_base", &self.api_base)
            .field("account_id", &self.account_id)
            .field("namespace", &self.namespace)
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Where dispatched requests are forwarded for execution.
#[derive(Debug, Clone)]
pub struct FabricConfig {
    pub base_url: String,
    pub timeout: Duration,
}
