#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

use dispatchbay::bootstrap::seed_demo_tenants;
use dispatchbay::fabric::MemoryFabric;
use dispatchbay::publish::RepairConfig;
use dispatchbay::registry::MemoryRegistry;
use dispatchbay::server::{AppState, create_router};
use dispatchbay::store::{SqliteStore, Store};

pub const FIRST_TOKEN: &str = "a1b2c3";
pub const FIRST_ID: &str = "559968cd-b048-4bbc-ba21-d12625fcee45";
pub const SECOND_TOKEN: &str = "d4e5f6";
pub const SECOND_ID: &str = "2612b586-4799-42ff-8c44-d4841e1e70ed";

pub struct TestApp {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub registry: Arc<MemoryRegistry>,
    pub fabric: Arc<MemoryFabric>,
    pub state: Arc<AppState>,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("response body is json")
    }
}

fn seeded_store(temp_dir: &TempDir) -> Arc<SqliteStore> {
    let store = SqliteStore::new(temp_dir.path().join("dispatchbay.db")).expect("open store");
    store.initialize().expect("initialize store");
    seed_demo_tenants(&store).expect("seed tenants");
    Arc::new(store)
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = seeded_store(&temp_dir);
        let registry = Arc::new(MemoryRegistry::new());
        let fabric = Arc::new(MemoryFabric::backed_by(Arc::clone(&registry)));
        let state = Arc::new(AppState::new(store.clone(), registry.clone(), fabric.clone()));
        Self::assemble(temp_dir, store, registry, fabric, state)
    }

    /// App with a repair worker that retries quickly.
    pub fn with_repairs() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = seeded_store(&temp_dir);
        let registry = Arc::new(MemoryRegistry::new());
        let fabric = Arc::new(MemoryFabric::backed_by(Arc::clone(&registry)));
        let config = RepairConfig {
            base_delay: Duration::from_millis(5),
            ..RepairConfig::default()
        };
        let (state, _worker) =
            AppState::with_repairs(store.clone(), registry.clone(), fabric.clone(), config);
        Self::assemble(temp_dir, store, registry, fabric, Arc::new(state))
    }

    fn assemble(
        temp_dir: TempDir,
        store: Arc<SqliteStore>,
        registry: Arc<MemoryRegistry>,
        fabric: Arc<MemoryFabric>,
        state: Arc<AppState>,
    ) -> Self {
        let router = create_router(Arc::clone(&state));
        Self {
            temp_dir,
            store,
            registry,
            fabric,
            state,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        TestResponse {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(build(Method::GET, uri, token, Body::empty())).await
    }

    pub async fn put_raw(&self, uri: &str, token: Option<&str>, body: &str) -> TestResponse {
        self.send(build(Method::PUT, uri, token, Body::from(body.to_string())))
            .await
    }

    pub async fn put_script(&self, name: &str, token: &str, body: serde_json::Value) -> TestResponse {
        self.put_raw(&format!("/script/{name}"), Some(token), &body.to_string())
            .await
    }
}

pub fn build(method: Method, uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("X-Customer-Token", token);
    }
    builder.body(body).expect("build request")
}
