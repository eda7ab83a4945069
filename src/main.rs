//! herbst
//!
//! Dashboard backend: serves the dashboard configuration, the live event
//! stream and static assets.
//!
//! # Configuration
//!
//! Process settings come from `herbst.toml` (see `herbst --print-settings`)
//! and `HERBST_*` environment variables. The dashboard itself lives in
//! `config.toml` / `themes.toml` inside the config directory.

use anyhow::Context;
use clap::Parser;
use herbst::config::{generate_default_settings, Settings};
use herbst::server::{serve, AppState, DashboardStore, DashboardWatcher, HubConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "herbst")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Homelab dashboard backend")]
struct Cli {
    /// Settings file (default: search the usual locations)
    #[arg(short, long, env = "HERBST_SETTINGS")]
    settings: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding config.toml and themes.toml
    #[arg(long)]
    config_dir: Option<String>,

    /// Directory served under /static
    #[arg(long)]
    static_dir: Option<String>,

    /// Print a default settings file and exit
    #[arg(long)]
    print_settings: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_settings {
        print!("{}", generate_default_settings());
        return Ok(());
    }

    let (mut settings, source) = Settings::load_default(cli.settings.as_deref())?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(dir) = cli.config_dir {
        settings.server.config_dir = Some(dir);
    }
    if let Some(dir) = cli.static_dir {
        settings.server.static_dir = dir;
    }

    settings.logging.init();
    tracing::info!("Starting herbst v{}", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => tracing::info!(path = ?path, "Loaded settings"),
        None => tracing::info!("No settings file found, using defaults and environment"),
    }

    let config_dir = settings.server.resolved_config_dir();
    tracing::info!(config_dir = ?config_dir, "Using config directory");

    let dashboard = DashboardStore::open(&config_dir)
        .with_context(|| format!("Failed to load dashboard from {}", config_dir.display()))?;

    let state = AppState::with_hub_config(
        dashboard,
        HubConfig {
            broadcast_capacity: settings.server.broadcast_capacity,
        },
    );

    // held for the lifetime of the server
    let _watcher = if settings.server.watch {
        let watcher = DashboardWatcher::spawn(
            state.dashboard.clone(),
            state.hub.clone(),
            settings.server.watch_debounce(),
        )
        .context("Failed to watch dashboard files")?;
        Some(watcher)
    } else {
        None
    };

    serve(state, &settings.server).await?;
    Ok(())
}
