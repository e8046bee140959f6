mod registry;
mod server;

pub use registry::{DEFAULT_API_BASE, DEFAULT_TIMEOUT, FabricConfig, RegistryConfig};
pub use server::ServerConfig;
