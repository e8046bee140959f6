use serde::Deserialize;

use crate::types::ResourceLimits;

pub const EXPECTED_SCRIPT_BODY: &str = "Expected json: { script: string, dispatch_config?: { limits?: { cpuMs: number, memory: number }, outbound?: string }}";

#[derive(Debug, Deserialize)]
pub struct PutScriptRequest {
    pub script: String,
    #[serde(default)]
    pub dispatch_config: Option<DispatchConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
    #[serde(default)]
    pub outbound: Option<String>,
}
