//! The execution fabric runs published scripts.
//!
//! Acquiring a handle is cheap and never checks that the script exists; the
//! fabric reports an unknown name only when the handle is invoked.

mod http;
mod memory;

pub use http::{DISPATCH_ERROR_HEADER, HttpFabric, SCRIPT_HEADER};
pub use memory::{MemoryFabric, Responder};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use serde::Serialize;
use thiserror::Error;

use crate::types::ResourceLimits;

/// Constraints a script runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchOptions {
    pub limits: ResourceLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound: Option<String>,
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("script not found")]
    NotFound,

    #[error("invocation failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait ScriptHandle: Send + Sync {
    fn script_name(&self) -> &str;

    async fn invoke(&self, request: Request<Body>) -> Result<Response<Body>, InvokeError>;
}

pub trait ExecutionFabric: Send + Sync {
    fn acquire(&self, script_name: &str, options: DispatchOptions) -> Box<dyn ScriptHandle>;
}
