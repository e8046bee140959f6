use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, header::CONTENT_TYPE};
use dashmap::DashMap;
use serde_json::json;

use super::{DispatchOptions, ExecutionFabric, InvokeError, ScriptHandle};
use crate::registry::MemoryRegistry;

/// Acquisitions kept for inspection; older ones are dropped.
pub const RECORDED_ACQUISITIONS: usize = 256;

pub type Responder =
    Arc<dyn Fn(Request<Body>) -> Result<Response<Body>, InvokeError> + Send + Sync>;

/// In-process fabric for local runs and tests.
///
/// Scripts answer through registered responders. When backed by a
/// [`MemoryRegistry`], any published script without a responder answers with
/// a JSON description of how it was dispatched.
#[derive(Default)]
pub struct MemoryFabric {
    responders: DashMap<String, Responder>,
    registry: Option<Arc<MemoryRegistry>>,
    acquired: Arc<Mutex<VecDeque<(String, DispatchOptions)>>>,
}

impl MemoryFabric {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn backed_by(registry: Arc<MemoryRegistry>) -> Self {
        Self {
            registry: Some(registry),
            ..Self::default()
        }
    }

    pub fn register<F>(&self, script_name: &str, responder: F)
    where
        F: Fn(Request<Body>) -> Result<Response<Body>, InvokeError> + Send + Sync + 'static,
    {
        self.responders
            .insert(script_name.to_string(), Arc::new(responder));
    }

    /// The most recent `(script, options)` pairs a handle was acquired with,
    /// oldest first.
    #[must_use]
    pub fn acquisitions(&self) -> Vec<(String, DispatchOptions)> {
        self.acquired
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

impl ExecutionFabric for MemoryFabric {
    fn acquire(&self, script_name: &str, options: DispatchOptions) -> Box<dyn ScriptHandle> {
        {
            let mut acquired = self.acquired.lock().unwrap_or_else(|e| e.into_inner());
            if acquired.len() == RECORDED_ACQUISITIONS {
                acquired.pop_front();
            }
            acquired.push_back((script_name.to_string(), options.clone()));
        }

        Box::new(MemoryHandle {
            script_name: script_name.to_string(),
            options,
            responder: self.responders.get(script_name).map(|r| Arc::clone(r.value())),
            registry: self.registry.clone(),
        })
    }
}

struct MemoryHandle {
    script_name: String,
    options: DispatchOptions,
    responder: Option<Responder>,
    registry: Option<Arc<MemoryRegistry>>,
}

#[async_trait]
impl ScriptHandle for MemoryHandle {
    fn script_name(&self) -> &str {
        &self.script_name
    }

    async fn invoke(&self, request: Request<Body>) -> Result<Response<Body>, InvokeError> {
        if let Some(responder) = &self.responder {
            return responder(request);
        }

        let published = self
            .registry
            .as_ref()
            .is_some_and(|r| r.contains(&self.script_name));
        if !published {
            return Err(InvokeError::NotFound);
        }

        let body = json!({
            "script": self.script_name,
            "method": request.method().as_str(),
            "path": request.uri().path(),
            "options": self.options,
        });
        Response::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .map_err(|e| InvokeError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use bytes::Bytes;

    use super::*;
    use crate::registry::NamespaceRegistry;
    use crate::types::ResourceLimits;

    fn request() -> Request<Body> {
        Request::builder().uri("/dispatch/s").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_acquire_never_fails_for_unknown_names() {
        let fabric = MemoryFabric::new();
        let handle = fabric.acquire("ghost", DispatchOptions::default());
        assert_eq!(fabric.acquisitions().len(), 1);
        assert!(matches!(handle.invoke(request()).await, Err(InvokeError::NotFound)));
    }

    #[tokio::test]
    async fn test_registered_responder_is_invoked() {
        let fabric = MemoryFabric::new();
        fabric.register(
            "s",
            |_| {
                Ok(Response::builder()
                    .status(StatusCode::IM_A_TEAPOT)
                    .body(Body::from("hi"))
                    .unwrap())
            },
        );

        let response = fabric
            .acquire("s", DispatchOptions::default())
            .invoke(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_registry_backed_fabric_describes_dispatch() {
        let registry = Arc::new(MemoryRegistry::new());
        registry.put_script("s", Bytes::from_static(b"code")).await.unwrap();
        let fabric = MemoryFabric::backed_by(Arc::clone(&registry));

        let options = DispatchOptions {
            limits: ResourceLimits {
                cpu_ms: Some(50),
                memory: Some(128),
            },
            outbound: None,
        };
        let response = fabric.acquire("s", options).invoke(request()).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["script"], "s");
        assert_eq!(json["options"]["limits"]["cpuMs"], 50);
        assert_eq!(json["options"]["limits"]["memory"], 128);
    }

    #[test]
    fn test_recorded_acquisitions_are_capped() {
        let fabric = MemoryFabric::new();
        for i in 0..RECORDED_ACQUISITIONS + 10 {
            fabric.acquire(&format!("s-{i}"), DispatchOptions::default());
        }

        let acquired = fabric.acquisitions();
        assert_eq!(acquired.len(), RECORDED_ACQUISITIONS);
        assert_eq!(acquired[0].0, "s-10");
        assert_eq!(
            acquired.last().unwrap().0,
            format!("s-{}", RECORDED_ACQUISITIONS + 9)
        );
    }
}
