//! Application State
//!
//! Shared state for all handlers, wrapped in `Arc` by the router.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use super::dashboard::{load_dir, DashboardError};
use super::error::{ApiError, ApiResult};
use super::hub::{EventHub, HubConfig};
use crate::schema::HerbstConfig;

/// The configuration currently served, plus where it came from
pub struct DashboardStore {
    dir: Option<PathBuf>,
    current: RwLock<Arc<HerbstConfig>>,
}

impl DashboardStore {
    /// Load from a config directory, writing default files where missing
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DashboardError> {
        let dir = dir.into();
        let config = load_dir(&dir)?;
        Ok(Self {
            dir: Some(dir),
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// A fixed configuration with no backing files
    pub fn fixed(config: HerbstConfig) -> Self {
        Self {
            dir: None,
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub async fn current(&self) -> Arc<HerbstConfig> {
        Arc::clone(&*self.current.read().await)
    }

    /// Re-read the files; the served configuration only changes on success
    pub async fn reload(&self) -> ApiResult<Arc<HerbstConfig>> {
        let Some(dir) = self.dir.clone() else {
            return Ok(self.current().await);
        };

        let config = tokio::task::spawn_blocking(move || load_dir(&dir))
            .await
            .map_err(|e| ApiError::Internal(format!("Reload task failed: {}", e)))??;

        let config = Arc::new(config);
        *self.current.write().await = Arc::clone(&config);
        Ok(config)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<DashboardStore>,
    pub hub: Arc<EventHub>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(dashboard: DashboardStore) -> Self {
        Self::with_hub_config(dashboard, HubConfig::default())
    }

    pub fn with_hub_config(dashboard: DashboardStore, hub_config: HubConfig) -> Self {
        Self {
            dashboard: Arc::new(dashboard),
            hub: Arc::new(EventHub::new(hub_config)),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
