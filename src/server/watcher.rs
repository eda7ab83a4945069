//! Dashboard File Watcher
//!
//! Watches the config directory for changes to `config.toml` or
//! `themes.toml`. A burst of changes is collapsed into one reload once the
//! directory has been quiet for the debounce interval; a successful reload
//! is announced to every session with a `reload` event.

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::dashboard::{DashboardError, CONFIG_FILENAME, THEMES_FILENAME};
use super::hub::EventHub;
use super::state::DashboardStore;
use crate::live::LiveEvent;

/// Debounce used by the backend unless configured otherwise
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Reloads the dashboard when its files change; stops when dropped
pub struct DashboardWatcher {
    // keeps the OS watch alive
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl DashboardWatcher {
    /// Start watching the directory backing `dashboard`
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        dashboard: Arc<DashboardStore>,
        hub: Arc<EventHub>,
        debounce: Duration,
    ) -> Result<Self, DashboardError> {
        let dir = dashboard
            .dir()
            .ok_or_else(|| DashboardError::Watch("dashboard has no backing directory".to_string()))?
            .to_path_buf();

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }
            if event.paths.iter().any(|p| is_dashboard_file(p)) {
                let _ = tx.send(());
            }
        })
        .map_err(|e| DashboardError::Watch(e.to_string()))?;

        // the directory, not the files: editors replace files on save
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| DashboardError::Watch(e.to_string()))?;

        tracing::info!(dir = ?dir, debounce_ms = debounce.as_millis() as u64, "Watching dashboard files");

        let task = tokio::spawn(reload_loop(rx, dashboard, hub, debounce));
        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for DashboardWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_dashboard_file(path: &Path) -> bool {
    path.file_name()
        .map_or(false, |name| name == CONFIG_FILENAME || name == THEMES_FILENAME)
}

async fn reload_loop(
    mut rx: mpsc::UnboundedReceiver<()>,
    dashboard: Arc<DashboardStore>,
    hub: Arc<EventHub>,
    debounce: Duration,
) {
    while rx.recv().await.is_some() {
        // wait until the burst settles
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        match dashboard.reload().await {
            Ok(config) => {
                let delivered = hub.publish(LiveEvent::Reload).await;
                tracing::info!(title = %config.title, sessions = delivered, "Dashboard files changed, reloaded");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dashboard files changed but failed to load, keeping previous configuration");
            }
        }
    }
}
