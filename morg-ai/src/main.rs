//! morg-ai - 3D model organizer service
//!
//! Accepts STL/OBJ/3MF uploads, extracts mesh metadata, enriches it with a
//! web search, asks a language model for creator/filename/file type and keeps
//! confirmed records in SQLite.

use anyhow::{Context, Result};
use clap::Parser;
use morg_common::config::{RootFolderInitializer, RootFolderResolver};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;

use morg_ai::AppState;

const MODULE_NAME: &str = "morg-ai";

/// Command-line arguments for morg-ai
#[derive(Parser, Debug)]
#[command(name = "morg-ai")]
#[command(about = "3D model organizer: upload, analyze and catalog mesh files")]
#[command(version)]
struct Args {
    /// Root folder holding morg.db and uploads/
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (default: ~/.config/morg/morg-ai.toml)
    #[arg(short, long, env = "MORG_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "MORG_PORT")]
    port: Option<u16>,

    /// Bind address (overrides config)
    #[arg(long, env = "MORG_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| morg_common::config::default_config_path(MODULE_NAME));
    let toml_config = morg_common::config::load_or_default(args.config.as_deref(), MODULE_NAME)
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml_config.logging.level)),
        )
        .init();

    // build identification first, before any slow startup work
    info!(
        "Starting morg-ai v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .with_config_path(args.config.clone())
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = morg_ai::db::init_database_pool(&db_path).await?;
    let records = morg_ai::db::records::count(&db_pool).await?;
    info!(records, "Database connection established");

    let analyzer = morg_ai::config::build_analyzer(&db_pool, &toml_config)
        .await
        .context("Failed to configure analysis pipeline")?;

    let bind = args.bind.clone().unwrap_or_else(|| toml_config.bind_address.clone());
    let port = args.port.unwrap_or(toml_config.port);
    let addr = morg_ai::config::listen_addr(&bind, port)?;

    let state = AppState::new(db_pool, analyzer, initializer.uploads_path(), toml_config)
        .with_config_path(config_path);
    let app = morg_ai::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Manage records: http://{}/manage", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
