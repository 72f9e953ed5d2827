//! Command-line interface for the Boardlink dispatch server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use boardlink_api::{AuthGateway, ServerState};
use boardlink_core::config::ServerConfig;
use boardlink_dispatch::{
    DispatchService, RedbSecondary, ReplicationCoordinator, SecondaryStore,
};
use boardlink_storage::DispatchStore;

/// Boardlink - command dispatch for polling devices.
#[derive(Parser, Debug)]
#[command(name = "boardlink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the dispatch server.
    Serve {
        /// Address to bind to (overrides BOARDLINK_BIND_ADDR).
        #[arg(long)]
        bind: Option<String>,
        /// Data directory (overrides BOARDLINK_DATA_DIR).
        #[arg(long)]
        data_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Serve { bind, data_dir } => {
            let mut config = ServerConfig::from_env()?;
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            serve(config).await
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn serve(config: ServerConfig) -> Result<()> {
    let store = Arc::new(
        DispatchStore::open(config.primary_db_path())
            .with_context(|| format!("opening primary store in {}", config.data_dir))?,
    );

    let mut secondaries: Vec<Arc<dyn SecondaryStore>> = Vec::new();
    for (i, path) in config.replica_paths.iter().enumerate() {
        let name = format!("replica-{}", i + 1);
        let secondary = RedbSecondary::open(name.clone(), path)
            .with_context(|| format!("opening replica store {}", path))?;
        tracing::info!(name = %name, path = %path, "Replica store attached");
        secondaries.push(Arc::new(secondary));
    }
    let replication = ReplicationCoordinator::new(
        secondaries,
        Duration::from_millis(config.mirror_timeout_ms),
    );
    if !replication.is_enabled() {
        tracing::info!("Mirroring disabled: no replica paths configured");
    }

    let service = Arc::new(DispatchService::new(store.clone(), replication));

    let registration_key = if config.registration_key.is_empty() {
        tracing::warn!("No registration key configured: operator signup is open");
        None
    } else {
        Some(config.registration_key.clone())
    };
    let auth = AuthGateway::new(store, registration_key, config.session_ttl_secs);

    let state = ServerState::new(service, auth);
    boardlink_api::serve(state, &config.bind_addr).await?;
    Ok(())
}
