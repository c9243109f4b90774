//! tabvault - Ephemeral Tabular Artifact Store
//!
//! Serves the ingest/fetch HTTP API, or runs one pipeline step from the
//! command line against the configured store.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabvault::{
    api::{build_app, ApiState},
    config::{StoreBackend, TabvaultConfig},
    render::{OutputFormat, Rendered},
    store::{open_store, spawn_sweeper, SystemClock},
    TableService,
};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tabvault")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Ephemeral tabular artifact store for model-generated JSON")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TABVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Storage backend (memory or sqlite)
    #[arg(long, env = "TABVAULT_BACKEND")]
    backend: Option<StoreBackend>,

    /// SQLite database path
    #[arg(long, env = "DB_PATH")]
    db_path: Option<PathBuf>,

    /// Artifact time-to-live in seconds
    #[arg(long, env = "TABVAULT_TTL_SECS")]
    ttl_secs: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Base URL advertised in fetch links
        #[arg(long, env = "TABVAULT_PUBLIC_URL")]
        public_url: Option<String>,
    },

    /// Ingest a JSON file ("-" for stdin) and print its data ID
    Ingest {
        /// Input file
        input: PathBuf,
    },

    /// Fetch a stored artifact by data ID
    Fetch {
        /// Data ID returned by ingest
        key: String,

        /// Output format: csv (default), json or records
        #[arg(short, long, default_value = "csv")]
        format: String,
    },

    /// Remove expired artifacts once and exit
    Sweep,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tabvault={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration, then apply CLI/env overrides
    let mut config = match &cli.config {
        Some(path) => TabvaultConfig::load(path)?,
        None => TabvaultConfig::default(),
    };
    if let Some(backend) = cli.backend {
        config.store.backend = backend;
    }
    if let Some(path) = cli.db_path {
        config.store.sqlite_path = path;
    }
    if let Some(ttl) = cli.ttl_secs {
        config.store.ttl_secs = ttl;
    }
    config.validate()?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            public_url,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(url) = public_url {
                config.server.public_base_url = url;
            }
            run_server(config).await?;
        }
        Commands::Ingest { input } => {
            run_ingest(&config, &input).await?;
        }
        Commands::Fetch { key, format } => {
            run_fetch(&config, &key, &format).await?;
        }
        Commands::Sweep => {
            run_sweep(&config).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

fn build_service(config: &TabvaultConfig) -> Result<Arc<TableService>> {
    let store = open_store(&config.store, Arc::new(SystemClock))?;
    Ok(Arc::new(TableService::new(store, config.store.ttl())))
}

async fn run_server(config: TabvaultConfig) -> Result<()> {
    tracing::info!("Starting tabvault");

    let service = build_service(&config)?;
    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        service.store().clone(),
        config.store.sweep_interval(),
        shutdown.clone(),
    );

    let state = ApiState {
        service,
        public_base_url: config.server.public_base_url.clone(),
    };
    let app = build_app(state, &config.server.cors_origins);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("tabvault listening on {}. Press Ctrl+C to stop.", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            signal.cancel();
        })
        .await?;

    tracing::info!("Shutting down...");
    shutdown.cancel();
    sweeper.await?;

    Ok(())
}

async fn run_ingest(config: &TabvaultConfig, input: &Path) -> Result<()> {
    if config.store.backend == StoreBackend::Memory {
        tracing::warn!("Memory backend selected; the artifact is gone when this process exits");
    }

    let text = if input.as_os_str() == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(input).await?
    };

    let service = build_service(config)?;
    let receipt = service.ingest(&text).await?;

    println!("{}", receipt.key);
    eprintln!(
        "Stored {} rows x {} columns for {}s. Fetch with: tabvault fetch {}",
        receipt.row_count,
        receipt.column_count,
        service.ttl().as_secs(),
        receipt.key
    );
    Ok(())
}

async fn run_fetch(config: &TabvaultConfig, key: &str, format: &str) -> Result<()> {
    let service = build_service(config)?;
    match service.retrieve(key, OutputFormat::parse(format)).await? {
        Rendered::Csv(body) => print!("{}", body),
        Rendered::Records(records) => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}

async fn run_sweep(config: &TabvaultConfig) -> Result<()> {
    if config.store.backend != StoreBackend::Sqlite {
        bail!("sweep only applies to the sqlite backend");
    }
    let service = build_service(config)?;
    let removed = service.store().purge_expired().await?;
    println!("Removed {} expired artifacts", removed);
    Ok(())
}

fn show_config(config: Option<&TabvaultConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
