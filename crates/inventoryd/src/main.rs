//! inventoryd — the common inventory daemon.
//!
//! Assembles the inventory subsystems into one process:
//! - Resource store (redb, on disk or in memory)
//! - Authenticator chain
//! - Reconciliation engine
//! - Event gateway
//! - REST API
//!
//! # Usage
//!
//! ```text
//! inventoryd --config /etc/inventory/inventory.toml serve --data-dir /var/lib/inventory
//! inventoryd migrate --data-dir /var/lib/inventory
//! inventoryd config
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inventory_api::{ApiState, build_router};
use inventory_authn::AuthenticatorChain;
use inventory_core::InventoryConfig;
use inventory_eventing::{Event, EventGateway};
use inventory_reconcile::ReconciliationEngine;
use inventory_state::StateStore;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,inventoryd=debug,inventory=debug";
const DB_FILE: &str = "inventory.redb";

#[derive(Parser)]
#[command(name = "inventoryd", about = "Common inventory daemon")]
struct Cli {
    /// Path to inventory.toml. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the REST API.
    Serve {
        /// Listen address, overriding `server.address`.
        #[arg(long)]
        address: Option<SocketAddr>,

        /// Directory for the store file, overriding `storage.path`.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Create or upgrade the store tables and exit.
    Migrate {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML.
    Config {
        /// Only validate; exit non-zero on problems.
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { address, data_dir } => {
            if let Some(address) = address {
                config.server.address = address;
            }
            apply_data_dir(&mut config, data_dir)?;
            ensure_valid(&config)?;
            serve(config).await
        }
        Command::Migrate { data_dir } => {
            apply_data_dir(&mut config, data_dir)?;
            ensure_valid(&config)?;
            migrate(&config)
        }
        Command::Config { check } => {
            ensure_valid(&config)?;
            if !check {
                print!("{}", config.to_toml_string()?);
            }
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<InventoryConfig> {
    match path {
        Some(path) => InventoryConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(InventoryConfig::default()),
    }
}

fn apply_data_dir(config: &mut InventoryConfig, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(dir) = data_dir {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating data dir {}", dir.display()))?;
        config.storage.path = Some(dir.join(DB_FILE));
    }
    Ok(())
}

fn ensure_valid(config: &InventoryConfig) -> anyhow::Result<()> {
    let problems = config.validate();
    if problems.is_empty() {
        return Ok(());
    }
    for problem in &problems {
        error!(%problem, "invalid configuration");
    }
    anyhow::bail!("invalid configuration:\n  {}", problems.join("\n  "))
}

fn open_store(config: &InventoryConfig) -> anyhow::Result<StateStore> {
    let store = match &config.storage.path {
        Some(path) => {
            let store = StateStore::open(path)
                .with_context(|| format!("opening store at {}", path.display()))?;
            info!(path = %path.display(), "resource store opened");
            store
        }
        None => {
            warn!("no storage.path configured, resources are kept in memory");
            StateStore::open_in_memory()?
        }
    };
    Ok(store)
}

fn migrate(config: &InventoryConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let (_, resources) = store.list_page(0, 0)?;
    let keys = store.reporter_index_len()?;
    info!(resources, reporter_keys = keys, "store tables are up to date");
    Ok(())
}

async fn serve(config: InventoryConfig) -> anyhow::Result<()> {
    info!("inventory daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let store = open_store(&config)?;
    let engine = ReconciliationEngine::new(store);

    let chain = AuthenticatorChain::from_config(&config.authn)
        .context("building authenticator chain")?;

    let (gateway, events) = EventGateway::from_config(&config.eventing);
    let consumer = events.map(|rx| tokio::spawn(log_events(rx)));

    info!(
        request_timeout = ?config.request_timeout(),
        emit_timeout = ?config.emit_timeout(),
        "subsystems initialized"
    );

    // ── Start API server ───────────────────────────────────────

    let state = ApiState::new(engine, chain, gateway, &config.server);
    let router = build_router(state);
    let addr = config.server.address;

    info!(%addr, base_path = %config.server.base_path, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    // The router held the last sender; the consumer drains and exits.
    if let Some(consumer) = consumer {
        let _ = consumer.await;
    }

    info!("inventory daemon stopped");
    Ok(())
}

/// In-process consumer for the `channel` eventer.
async fn log_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => info!(target: "inventoryd::events", event = %line, "event"),
            Err(e) => warn!(error = %e, "unserializable event"),
        }
    }
}
