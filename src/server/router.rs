use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{any, get, put},
};
use tokio::task::JoinHandle;

use super::dispatch::dispatch_script;
use super::scripts::{list_scripts, put_script};
use crate::claim::NameLocks;
use crate::fabric::ExecutionFabric;
use crate::publish::{Publisher, RepairConfig, RepairQueue};
use crate::registry::NamespaceRegistry;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<dyn NamespaceRegistry>,
    pub fabric: Arc<dyn ExecutionFabric>,
    pub publisher: Publisher,
}

impl AppState {
    /// State without background repair of failed publish steps.
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<dyn NamespaceRegistry>,
        fabric: Arc<dyn ExecutionFabric>,
    ) -> Self {
        let publisher = Publisher::new(Arc::clone(&store), Arc::clone(&registry), NameLocks::new());
        Self {
            store,
            registry,
            fabric,
            publisher,
        }
    }

    /// State with a repair worker. Must be called inside a tokio runtime.
    pub fn with_repairs(
        store: Arc<dyn Store>,
        registry: Arc<dyn NamespaceRegistry>,
        fabric: Arc<dyn ExecutionFabric>,
        config: RepairConfig,
    ) -> (Self, JoinHandle<()>) {
        let locks = NameLocks::new();
        let (queue, worker) =
            RepairQueue::spawn(Arc::clone(&registry), locks.clone(), config);
        let publisher =
            Publisher::new(Arc::clone(&store), Arc::clone(&registry), locks).with_repairs(queue);
        let state = Self {
            store,
            registry,
            fabric,
            publisher,
        };
        (state, worker)
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/script", get(list_scripts))
        .route("/script/{name}", put(put_script))
        .route("/dispatch/{name}", any(dispatch_script))
        .route("/dispatch/{name}/{*rest}", any(dispatch_script))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
