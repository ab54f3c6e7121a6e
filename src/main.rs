//! Harvest Ledger daemon
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! harvest-ledger serve
//!
//! # Start with custom config, port and storage directory
//! harvest-ledger --config /path/to/config.toml serve
//! harvest-ledger --http-port 8081 --storage-dir /data/ledger serve
//!
//! # Mint an admin token (admins cannot log in over HTTP)
//! HARVEST_LEDGER_JWT_SECRET=... harvest-ledger issue-token --subject A1 --role admin
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use harvest_ledger::services::events::spawn_logging_listener;
use harvest_ledger::{Config, HttpServer, Identity, LedgerDb, Role, Services, TokenIssuer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "harvest-ledger")]
#[command(about = "Produce collection ledger with versioned status updates")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, global = true)]
    http_port: Option<u16>,

    /// Token signing secret (at least 32 characters)
    #[arg(long, global = true, env = "HARVEST_LEDGER_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,

    /// Print a bearer token for the given subject and role
    IssueToken {
        /// Actor id carried in the token
        #[arg(long)]
        subject: String,

        /// farmer, collector or admin
        #[arg(long)]
        role: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("harvest_ledger=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load config
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = cli.http_port {
        config.http_port = port;
    }
    if let Some(secret) = cli.jwt_secret {
        config.jwt_secret = Some(secret);
    }

    let tokens = Arc::new(token_issuer(&config)?);

    match cli.command {
        Command::IssueToken { subject, role } => {
            let role: Role = role.parse().map_err(anyhow::Error::msg)?;
            let token = tokens.issue(&Identity::new(subject, role))?;
            println!("{}", token);
            Ok(())
        }
        Command::Serve => serve(config, tokens).await,
    }
}

fn token_issuer(config: &Config) -> anyhow::Result<TokenIssuer> {
    match &config.jwt_secret {
        Some(secret) => Ok(TokenIssuer::new(secret.clone(), config.token_ttl_secs)?),
        None => {
            warn!("No jwt_secret configured; using the development secret");
            warn!("  Set HARVEST_LEDGER_JWT_SECRET or jwt_secret in config.toml for production");
            Ok(TokenIssuer::new_dev(config.token_ttl_secs))
        }
    }
}

async fn serve(config: Config, tokens: Arc<TokenIssuer>) -> anyhow::Result<()> {
    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        policy = ?config.transition_policy(),
        "Starting harvest-ledger"
    );

    // Ensure storage directory exists
    tokio::fs::create_dir_all(&config.storage_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = Arc::new(LedgerDb::open(&config.storage_dir)?);
    let services = Arc::new(Services::new(Arc::clone(&db), Arc::clone(&tokens), &config));
    let listener = spawn_logging_listener(Arc::clone(&services.events));

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let http_server = Arc::new(HttpServer::new(services, tokens, http_addr));

    info!("HTTP API available at http://{}", http_addr);
    info!("Endpoints:");
    info!("  GET    /health                   - Health check");
    info!("  POST   /farmers, /collectors     - Signup");
    info!("  POST   /auth/login               - Login");
    info!("  POST   /collections              - Record a collection");
    info!("  PATCH  /collections/{{id}}/status  - Versioned status change");
    info!("  GET    /farmer/history, /farmer/wallet");
    info!("Press Ctrl+C to stop.");

    // Handle shutdown signal
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    listener.abort();

    // Print stats before exit
    if let Ok(stats) = db.stats() {
        info!(
            farmers = stats.farmer_count,
            collectors = stats.collector_count,
            collections = stats.collection_count,
            "Final ledger stats"
        );
    }

    Ok(())
}
