//! Request-time resolution of which script to run and under which limits.

use axum::body::Body;
use axum::http::{Request, Response};

use crate::error::{Error, Result};
use crate::fabric::{DispatchOptions, ExecutionFabric, InvokeError};
use crate::store::Store;

/// Looks up the stored limits and outbound binding for a script. Missing
/// rows mean default limits and no outbound worker.
pub fn resolve_options(store: &dyn Store, script_name: &str) -> Result<DispatchOptions> {
    let limits = store
        .get_resource_policy(script_name)?
        .map(|p| p.limits)
        .unwrap_or_default();
    let outbound = store
        .get_outbound_policy(script_name)?
        .map(|p| p.outbound_script_name)
        .filter(|name| !name.is_empty());

    Ok(DispatchOptions { limits, outbound })
}

/// Runs `request` against `script_name` and returns the script's response
/// untouched. Never retried: the request may have side effects downstream.
pub async fn dispatch(
    store: &dyn Store,
    fabric: &dyn ExecutionFabric,
    script_name: &str,
    request: Request<Body>,
) -> Result<Response<Body>> {
    let options = resolve_options(store, script_name)?;
    let handle = fabric.acquire(script_name, options);

    handle.invoke(request).await.map_err(|e| match e {
        InvokeError::NotFound => Error::ScriptNotFound,
        InvokeError::Failed(reason) => Error::DependencyUnavailable(reason),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use tempfile::TempDir;

    use super::*;
    use crate::fabric::MemoryFabric;
    use crate::store::SqliteStore;
    use crate::types::{OutboundPolicy, ResourceLimits, ResourcePolicy};

    fn open_store(temp: &TempDir) -> SqliteStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/dispatch/s").body(Body::empty()).unwrap()
    }

    #[test]
    fn test_missing_policies_mean_defaults() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let options = resolve_options(&store, "s").unwrap();
        assert_eq!(options, DispatchOptions::default());
    }

    #[test]
    fn test_stored_policy_round_trips_into_options() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        store
            .upsert_resource_policy(&ResourcePolicy {
                script_name: "s".to_string(),
                limits: ResourceLimits {
                    cpu_ms: Some(50),
                    memory: Some(128),
                },
            })
            .unwrap();
        store
            .upsert_outbound_policy(&OutboundPolicy {
                script_name: "s".to_string(),
                outbound_script_name: "egress".to_string(),
            })
            .unwrap();

        let options = resolve_options(&store, "s").unwrap();
        assert_eq!(options.limits.cpu_ms, Some(50));
        assert_eq!(options.limits.memory, Some(128));
        assert_eq!(options.outbound.as_deref(), Some("egress"));
    }

    #[tokio::test]
    async fn test_unknown_script_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let fabric = MemoryFabric::new();

        let result = dispatch(&store, &fabric, "does-not-exist", request()).await;
        assert!(matches!(result, Err(Error::ScriptNotFound)));
        assert_eq!(fabric.acquisitions().len(), 1);
    }

    #[tokio::test]
    async fn test_invocation_failure_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let fabric = MemoryFabric::new();
        fabric.register("s", |_| Err(InvokeError::Failed("connection reset".to_string())));

        let result = dispatch(&store, &fabric, "s", request()).await;
        assert!(matches!(result, Err(Error::DependencyUnavailable(_))));
    }

    #[tokio::test]
    async fn test_response_is_returned_unmodified() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let fabric = MemoryFabric::new();
        fabric.register(
            "s",
            |_| {
                Ok(Response::builder()
                    .status(StatusCode::CREATED)
                    .header("x-script", "s")
                    .body(Body::from("made"))
                    .unwrap())
            },
        );

        let response = dispatch(&store, &fabric, "s", request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-script"], "s");
    }
}
