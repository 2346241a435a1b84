//! Dorothy - plugin-based music playback daemon
//!
//! Start-up: resolve the config directory, load `dorothy.toml`, initialise
//! logging, build every enabled node of the compiled-in plugins, then hand
//! over to the mainloop until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dorothy_common::config::{resolve_config_dir, TomlConfig, BOOTSTRAP_FILE_NAME};
use dorothy_daemon::builtin;
use dorothy_daemon::plugin::{load_nodes, NodeConfigStore};
use dorothy_daemon::Mainloop;

/// Command-line arguments for dorothy
#[derive(Parser, Debug)]
#[command(name = "dorothy")]
#[command(about = "Plugin-based music playback daemon")]
#[command(version)]
struct Args {
    /// Configuration directory (node configs and dorothy.toml)
    #[arg(short, long, env = "DOROTHY_CONFIG_DIR")]
    config: Option<PathBuf>,

    /// Log level filter, overridden by RUST_LOG
    #[arg(short, long, env = "DOROTHY_LOG")]
    log_level: Option<String>,
}

fn init_tracing(level: &str, log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log level")?;

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = resolve_config_dir(args.config.as_deref());
    let loaded = TomlConfig::load(&config_dir).context("Failed to load dorothy.toml")?;
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    init_tracing(&level, config.logging.file.as_ref())?;

    info!("Starting dorothy {}", env!("CARGO_PKG_VERSION"));
    info!("Config directory: {}", config_dir.display());
    if !found {
        warn!(
            "Bootstrap config {} not found, using defaults",
            config_dir.join(BOOTSTRAP_FILE_NAME).display()
        );
    }

    let registry = builtin::registry();
    let store = NodeConfigStore::new(&config_dir);
    let nodes = load_nodes(&registry, &store).await;

    Mainloop::new(nodes.orchestrator, nodes.controllers)
        .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
        .run(shutdown_signal())
        .await;

    info!("dorothy stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
