//! Configuration Loader
//!
//! One-shot fetch of `/api/config` at session start, validated through
//! [`crate::schema`]. [`ConfigLoader::load_or_fallback`] never fails: the
//! dashboard always gets something to render.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::schema::{
    detect_version, validate, DockerConfig, HerbstConfig, SchemaVersion, SystemConfig,
    ValidationError, WeatherConfig,
};

/// Loader settings
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// API base URL (e.g., "http://localhost:8080")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

/// Transport-level failure fetching the configuration
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Configuration request timed out")]
    Timeout,

    #[error("Configuration server unavailable")]
    Unavailable,

    #[error("Configuration server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Configuration request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl FetchError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Unavailable
        } else {
            FetchError::Request(e)
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

/// Result of [`ConfigLoader::load_or_fallback`]
#[derive(Debug, Clone)]
pub struct Loaded {
    pub config: HerbstConfig,
    /// Non-blocking notice when the fallback configuration is in use
    pub notice: Option<String>,
    /// Schema revision the server spoke, when a payload was received
    pub version: Option<SchemaVersion>,
}

impl Loaded {
    pub fn is_fallback(&self) -> bool {
        self.notice.is_some()
    }
}

pub struct ConfigLoader {
    client: Client,
    config: LoaderConfig,
}

impl ConfigLoader {
    pub fn new(config: LoaderConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!("{}/api/config", self.config.base_url.trim_end_matches('/'))
    }

    /// Fetch and validate the dashboard configuration
    pub async fn load(&self) -> Result<HerbstConfig, LoadError> {
        self.load_versioned().await.map(|(config, _)| config)
    }

    async fn load_versioned(&self) -> Result<(HerbstConfig, SchemaVersion), LoadError> {
        let url = self.url();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body = response.text().await.map_err(FetchError::from_reqwest)?;
        let raw: Value =
            serde_json::from_str(&body).map_err(|e| ValidationError::Syntax(e.to_string()))?;

        let version = detect_version(&raw);
        if version != SchemaVersion::CURRENT {
            tracing::info!(version = %version, "Configuration uses an older schema, filling defaults");
        }

        let config = strip_disabled(validate(&raw)?);
        tracing::debug!(url = %url, version = %version, title = %config.title, "Configuration loaded");
        Ok((config, version))
    }

    /// Load, falling back to [`HerbstConfig::fallback`] on any error
    pub async fn load_or_fallback(&self) -> Loaded {
        match self.load_versioned().await {
            Ok((config, version)) => Loaded {
                config,
                notice: None,
                version: Some(version),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Using fallback configuration");
                Loaded {
                    config: HerbstConfig::fallback(),
                    notice: Some(format!("Configuration unavailable ({}); showing defaults", e)),
                    version: None,
                }
            }
        }
    }
}

/// Replace sections whose feature is disabled with their defaults
fn strip_disabled(mut config: HerbstConfig) -> HerbstConfig {
    if !config.weather.enabled {
        config.weather = WeatherConfig::default();
    }
    if !config.docker.enabled {
        config.docker = DockerConfig::default();
    }
    if !config.system.enabled {
        config.system = SystemConfig::default();
    }
    config
}
