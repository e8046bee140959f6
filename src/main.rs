use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dispatchbay::bootstrap::{clear_namespace, create_tenant, namespace_status, seed_demo_tenants};
use dispatchbay::config::{DEFAULT_API_BASE, FabricConfig, RegistryConfig, ServerConfig};
use dispatchbay::error::Error;
use dispatchbay::fabric::{ExecutionFabric, HttpFabric, MemoryFabric};
use dispatchbay::publish::RepairConfig;
use dispatchbay::registry::{HttpRegistry, MemoryRegistry, NamespaceRegistry};
use dispatchbay::server::{AppState, create_router};
use dispatchbay::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "dispatchbay")]
#[command(about = "A multi-tenant script dispatch control plane", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, env = "DISPATCHBAY_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, env = "DISPATCHBAY_PORT", default_value = "8080")]
        port: u16,

        /// Data directory for the database
        #[arg(long, env = "DISPATCHBAY_DATA_DIR", default_value = "./data")]
        data_dir: String,

        #[command(flatten)]
        registry: RegistryArgs,

        /// Base URL of the execution fabric that runs dispatched scripts
        #[arg(long, env = "DISPATCHBAY_FABRIC_URL")]
        fabric_url: Option<String>,

        /// Run against in-memory registry and fabric, seeding demo customers if needed
        #[arg(long)]
        local: bool,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Recreate the database and seed the demo customers
    Init {
        #[arg(long, env = "DISPATCHBAY_DATA_DIR", default_value = "./data")]
        data_dir: String,
    },

    /// Create a customer and print its token
    CreateTenant {
        #[arg(long, env = "DISPATCHBAY_DATA_DIR", default_value = "./data")]
        data_dir: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Plan tier, recorded as an ownership tag on every claimed script
        #[arg(long)]
        plan: String,
    },

    /// Show customers, deployed scripts with their tags, and stored policies
    Status {
        #[arg(long, env = "DISPATCHBAY_DATA_DIR", default_value = "./data")]
        data_dir: String,

        /// Only this customer and the scripts it owns
        #[arg(long)]
        tenant: Option<String>,

        #[command(flatten)]
        registry: RegistryArgs,
    },

    /// Delete every script in the namespace and reseed the demo customers
    Reset {
        #[arg(long, env = "DISPATCHBAY_DATA_DIR", default_value = "./data")]
        data_dir: String,

        #[command(flatten)]
        registry: RegistryArgs,
    },
}

#[derive(Args)]
struct RegistryArgs {
    /// Account that owns the dispatch namespace
    #[arg(long, env = "DISPATCH_NAMESPACE_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Dispatch namespace name
    #[arg(long, env = "DISPATCH_NAMESPACE_NAME")]
    namespace: Option<String>,

    /// Registry API token
    #[arg(long, env = "DISPATCH_NAMESPACE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Registry API base URL
    #[arg(long, env = "DISPATCHBAY_REGISTRY_URL", default_value = DEFAULT_API_BASE)]
    registry_url: String,

    /// Timeout in seconds for registry and fabric calls
    #[arg(long, env = "DISPATCHBAY_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,
}

impl RegistryArgs {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn to_config(&self) -> anyhow::Result<RegistryConfig> {
        let (Some(account_id), Some(namespace), Some(api_token)) =
            (&self.account_id, &self.namespace, &self.api_token)
        else {
            bail!(
                "Registry not configured. Set DISPATCH_NAMESPACE_ACCOUNT_ID, DISPATCH_NAMESPACE_NAME and DISPATCH_NAMESPACE_API_TOKEN, or pass --local."
            );
        };

        Ok(RegistryConfig {
            api_base: self.registry_url.clone(),
            account_id: account_id.clone(),
            namespace: namespace.clone(),
            api_token: api_token.clone(),
            timeout: self.timeout(),
        })
    }
}

fn open_store(data_dir: &str) -> anyhow::Result<SqliteStore> {
    let data_path = PathBuf::from(data_dir);
    fs::create_dir_all(&data_path)?;

    let config = ServerConfig {
        data_dir: data_path,
        ..ServerConfig::default()
    };
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    Ok(store)
}

fn run_init(data_dir: &str) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let tenants = seed_demo_tenants(&store)?;

    println!();
    println!("Seeded {} demo customers:", tenants.len());
    for tenant in &tenants {
        println!("  {} ({}, {})", tenant.display_name, tenant.id, tenant.plan_tier);
    }
    println!();

    Ok(())
}

fn run_create_tenant(data_dir: &str, name: &str, plan: &str) -> anyhow::Result<()> {
    if name.trim().is_empty() || plan.trim().is_empty() {
        bail!("Name and plan cannot be empty");
    }

    let store = open_store(data_dir)?;
    let (tenant, raw_token) = create_tenant(&store, name.trim(), plan.trim())?;

    println!();
    println!("========================================");
    println!("Created customer '{}' ({})", tenant.display_name, tenant.id);
    println!("Token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();

    Ok(())
}

async fn run_status(data_dir: &str, tenant: Option<&str>, registry: &RegistryArgs) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let registry = HttpRegistry::new(&registry.to_config()?)?;
    let status = match namespace_status(&store, &registry, tenant).await {
        Err(Error::NotFound) => bail!("No customer with id {}", tenant.unwrap_or_default()),
        other => other?,
    };

    println!();
    println!("Customers:");
    for tenant in &status.tenants {
        println!("  {} ({}, {})", tenant.display_name, tenant.id, tenant.plan_tier);
    }

    println!();
    println!("Scripts:");
    if status.scripts.is_empty() {
        println!("  (none)");
    }
    for entry in &status.scripts {
        let limits = entry.limits.unwrap_or_default();
        println!(
            "  {}  tags=[{}]  cpu_ms={}  memory={}  outbound={}",
            entry.script.id,
            entry.script.tags.join(","),
            limits.cpu_ms.map_or_else(|| "-".to_string(), |v| v.to_string()),
            limits.memory.map_or_else(|| "-".to_string(), |v| v.to_string()),
            entry.outbound.as_deref().unwrap_or("-"),
        );
    }

    if !status.orphaned_policies.is_empty() {
        println!();
        println!("Policies without a deployed script:");
        for name in &status.orphaned_policies {
            println!("  {name}");
        }
    }
    println!();

    Ok(())
}

async fn run_reset(data_dir: &str, registry: &RegistryArgs) -> anyhow::Result<()> {
    let registry = HttpRegistry::new(&registry.to_config()?)?;
    let deleted = clear_namespace(&registry).await?;
    info!("Deleted {deleted} scripts from the namespace");

    run_init(data_dir)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dispatchbay=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir } => run_init(&data_dir)?,
            AdminCommands::CreateTenant {
                data_dir,
                name,
                plan,
            } => run_create_tenant(&data_dir, &name, &plan)?,
            AdminCommands::Status {
                data_dir,
                tenant,
                registry,
            } => run_status(&data_dir, tenant.as_deref(), &registry).await?,
            AdminCommands::Reset { data_dir, registry } => run_reset(&data_dir, &registry).await?,
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            registry,
            fabric_url,
            local,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
            };
            fs::create_dir_all(&config.data_dir)?;

            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;
            if !store.has_tenants()? {
                if !local {
                    bail!("No customers found. Run 'dispatchbay admin init' first to seed the customer directory.");
                }
                seed_demo_tenants(&store)?;
                info!("Seeded demo customers for local mode");
            }

            let (registry, fabric): (Arc<dyn NamespaceRegistry>, Arc<dyn ExecutionFabric>) = if local {
                let registry = Arc::new(MemoryRegistry::new());
                let fabric = Arc::new(MemoryFabric::backed_by(Arc::clone(&registry)));
                info!("Using in-memory registry and fabric");
                (registry as Arc<dyn NamespaceRegistry>, fabric as Arc<dyn ExecutionFabric>)
            } else {
                let Some(base_url) = fabric_url else {
                    bail!("Execution fabric not configured. Set DISPATCHBAY_FABRIC_URL or pass --local.");
                };
                let fabric = HttpFabric::new(&FabricConfig {
                    base_url,
                    timeout: registry.timeout(),
                })?;
                let registry = HttpRegistry::new(&registry.to_config()?)?;
                (
                    Arc::new(registry) as Arc<dyn NamespaceRegistry>,
                    Arc::new(fabric) as Arc<dyn ExecutionFabric>,
                )
            };

            let (state, _repairs) =
                AppState::with_repairs(Arc::new(store), registry, fabric, RepairConfig::default());

            let app = create_router(Arc::new(state));
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
