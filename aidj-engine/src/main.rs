//! AI DJ engine - Main entry point
//!
//! Loads configuration, the track catalog, the event plan and the VIP
//! roster, then serves the control API until interrupted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aidj_common::config::DjConfig;
use aidj_common::models::{EventPlan, VipGuest};
use aidj_engine::api::{self, AppContext};
use aidj_engine::collaborators::FileCatalogProvider;
use aidj_engine::{Collaborators, DjSession, TrackCatalog};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for aidj-engine
#[derive(Parser, Debug)]
#[command(name = "aidj-engine")]
#[command(about = "AI DJ orchestration engine")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "AIDJ_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "AIDJ_PORT")]
    port: Option<u16>,

    /// Track catalog JSON file
    #[arg(long, env = "AIDJ_CATALOG")]
    catalog: Option<PathBuf>,

    /// Event plan JSON file
    #[arg(long, env = "AIDJ_PLAN")]
    plan: Option<PathBuf>,

    /// VIP guest roster JSON file
    #[arg(long, env = "AIDJ_GUESTS")]
    guests: Option<PathBuf>,

    /// Start the session immediately instead of waiting for POST /session/start
    #[arg(long, env = "AIDJ_AUTOSTART")]
    autostart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = DjConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // RUST_LOG wins over the configured level
    let default_filter = format!("aidj_engine={0},aidj_common={0},tower_http=info", config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting AI DJ engine v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let catalog = Arc::new(TrackCatalog::new());
    match &args.catalog {
        Some(path) => {
            let provider = FileCatalogProvider::load(path)
                .await
                .with_context(|| format!("Failed to read catalog {}", path.display()))?;
            catalog
                .populate(&provider)
                .await
                .context("Failed to populate catalog")?;
        }
        None => warn!("No catalog given, mood transitions will have nothing to play"),
    }

    let collaborators =
        Collaborators::from_config(&config.collaborators).context("Failed to build collaborators")?;
    let host = config.server.host.clone();
    let port = config.server.port;
    let session = Arc::new(DjSession::new(config, collaborators, catalog));

    let plan = match &args.plan {
        Some(path) => read_plan(path).await?,
        None => EventPlan::default(),
    };
    let guests = match &args.guests {
        Some(path) => read_guests(path).await?,
        None => Vec::new(),
    };
    session
        .initialize(plan, guests)
        .context("Failed to initialize session")?;

    if args.autostart {
        session.start().await.context("Failed to start session")?;
    }

    let ctx = AppContext {
        session: Arc::clone(&session),
        port,
    };
    let served = api::run(ctx, &host, shutdown_signal()).await;

    session.stop().await;
    served.context("HTTP server failed")?;
    info!("Shutdown complete");
    Ok(())
}

async fn read_plan(path: &Path) -> Result<EventPlan> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read event plan {}", path.display()))?;
    EventPlan::from_json(&json).with_context(|| format!("Invalid event plan {}", path.display()))
}

async fn read_guests(path: &Path) -> Result<Vec<VipGuest>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read guest roster {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid guest roster {}", path.display()))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
