//! herbst-session
//!
//! Headless dashboard session. Loads the configuration (falling back to
//! defaults), themes an in-memory root, resolves service icons, then keeps
//! the live widgets current until Ctrl+C. A `reload` event from the server
//! starts a fresh session with the new configuration.
//!
//! Run with: cargo run --bin herbst-session -- --api-base http://localhost:8080

use clap::Parser;
use herbst::config::Settings;
use herbst::icon;
use herbst::live::{FeedState, LiveSnapshot, LiveStateStore, SseChannel};
use herbst::loader::{ConfigLoader, Loaded};
use herbst::schema::Feed;
use herbst::theme::{RootStyle, ThemeApplier};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "herbst-session")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Headless herbst dashboard session")]
struct Cli {
    /// Settings file (default: search the usual locations)
    #[arg(short, long, env = "HERBST_SETTINGS")]
    settings: Option<PathBuf>,

    /// API base URL of the herbst backend
    #[arg(long)]
    api_base: Option<String>,

    /// Print the snapshot as JSON on every change
    #[arg(long)]
    json: bool,
}

enum Outcome {
    Reload,
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut settings, source) = Settings::load_default(cli.settings.as_deref())?;
    if let Some(base) = cli.api_base {
        settings.session.api_base = base;
    }
    settings.logging.init();
    if let Some(path) = &source {
        tracing::info!(path = ?path, "Loaded settings");
    }

    let loader = ConfigLoader::new(settings.session.loader_config())?;
    let channel = Arc::new(SseChannel::new(&settings.session.api_base)?);
    let mut theme = ThemeApplier::new(RootStyle::default());

    loop {
        let loaded = loader.load_or_fallback().await;
        render_shell(&loaded, &mut theme);

        let store = LiveStateStore::start(
            &loaded.config,
            channel.clone(),
            settings.session.reconnect.policy(),
        );
        let outcome = watch_store(&store, cli.json).await;
        store.shutdown().await;

        match outcome {
            Outcome::Reload => tracing::info!("Configuration changed on the server, reloading"),
            Outcome::Quit => break,
        }
    }

    tracing::info!("Session ended");
    Ok(())
}

/// Theme the root and lay out the service sections
fn render_shell(loaded: &Loaded, theme: &mut ThemeApplier<RootStyle>) {
    if let Some(notice) = &loaded.notice {
        tracing::warn!("{}", notice);
    }

    let config = &loaded.config;
    theme.apply(&config.theme_vars);
    tracing::info!(
        title = %config.title,
        theme = %config.theme,
        variables = theme.surface().len(),
        version = ?loaded.version,
        "Dashboard ready"
    );
    tracing::debug!("Root style:\n{}", theme.surface().to_css());

    for section in config.display_sections() {
        let title = if section.title.is_empty() { "(other)" } else { &section.title };
        for service in &section.services {
            tracing::info!(
                section = %title,
                name = %service.name,
                url = %service.url,
                icon = icon::resolve(service.icon.as_deref()).unwrap_or("-"),
                "Service"
            );
        }
    }
}

async fn watch_store(store: &LiveStateStore, json: bool) -> Outcome {
    let mut updates = store.subscribe();
    let mut previous = LiveSnapshot::default();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Outcome::Quit;
                }
            }
            _ = tokio::signal::ctrl_c() => return Outcome::Quit,
        }

        let snapshot = updates.borrow_and_update().clone();
        report(&previous, &snapshot, json);
        if snapshot.reload_requested {
            return Outcome::Reload;
        }
        previous = snapshot;
    }
}

fn report(previous: &LiveSnapshot, current: &LiveSnapshot, json: bool) {
    for feed in Feed::ALL {
        let (before, after) = (previous.status(feed), current.status(feed));
        if before.state != after.state || before.issue != after.issue {
            match (&after.state, &after.issue) {
                (FeedState::Streaming, _) | (_, None) => {
                    tracing::info!(feed = %feed, state = %after.state, "Feed state")
                }
                (_, Some(issue)) => {
                    tracing::warn!(feed = %feed, state = %after.state, issue = ?issue, "Feed state")
                }
            }
        }
    }

    if json {
        match serde_json::to_string(current) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to encode snapshot"),
        }
        return;
    }

    if current.weather.data != previous.weather.data {
        if let Some(w) = &current.weather.data {
            tracing::info!(city = %w.city, temp = w.temp, humidity = w.humidity, "{}", w.description);
        }
    }
    if current.docker.data != previous.docker.data {
        let containers = current.containers();
        let running = containers.iter().filter(|c| c.state == "running").count();
        tracing::info!(total = containers.len(), running, "Containers");
    }
    if current.system.data != previous.system.data {
        if let Some(s) = &current.system.data {
            tracing::info!(
                cpu = s.cpu_percent,
                memory = s.memory_percent().unwrap_or(0.0),
                disk = s.disk_percent().unwrap_or(0.0),
                uptime_secs = s.uptime_secs,
                "System"
            );
        }
    }
}
