//! # Dispatchbay
//!
//! A control plane that lets tenants publish scripts into a shared dispatch
//! namespace and routes inbound requests to them by name. Usable as a
//! standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dispatchbay::fabric::MemoryFabric;
//! use dispatchbay::registry::MemoryRegistry;
//! use dispatchbay::server::{AppState, create_router};
//! use dispatchbay::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/dispatchbay.db").unwrap();
//! store.initialize().unwrap();
//!
//! let registry = Arc::new(MemoryRegistry::new());
//! let fabric = Arc::new(MemoryFabric::backed_by(registry.clone()));
//! let state = Arc::new(AppState::new(Arc::new(store), registry, fabric));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `dispatchbay` binary. Disable with `default-features = false`.

pub mod auth;
pub mod bootstrap;
pub mod claim;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fabric;
pub mod publish;
pub mod registry;
pub mod server;
pub mod store;
pub mod types;
