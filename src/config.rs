//! Configuration System
//!
//! Process settings for the `herbst` server and the `herbst-session` client:
//! where to listen, where the dashboard files live, which API a session
//! talks to, and how to log. Loaded from a TOML file with `HERBST_*`
//! environment overrides.
//!
//! The dashboard itself (title, services, widgets) is configured separately
//! in `config.toml` inside the config directory; see [`crate::server::dashboard`].

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::live::ReconnectPolicy;
use crate::loader::LoaderConfig;
use crate::server::dashboard::{resolve_config_dir, ENV_CONFIG_DIR};

/// Main settings structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Dashboard backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding `config.toml` and `themes.toml`; resolved
    /// automatically when unset
    #[serde(default)]
    pub config_dir: Option<String>,

    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Reload automatically when the dashboard files change
    #[serde(default = "default_watch")]
    pub watch: bool,

    #[serde(default = "default_watch_debounce")]
    pub watch_debounce_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> String {
    "./static".to_string()
}

fn default_broadcast_capacity() -> usize {
    256
}

fn default_watch() -> bool {
    true
}

fn default_watch_debounce() -> u64 {
    500
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            config_dir: None,
            static_dir: default_static_dir(),
            broadcast_capacity: default_broadcast_capacity(),
            watch: default_watch(),
            watch_debounce_ms: default_watch_debounce(),
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn resolved_config_dir(&self) -> PathBuf {
        resolve_config_dir(self.config_dir.as_deref())
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}

/// Dashboard session (client) settings
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub reconnect: ReconnectSettings,
}

fn default_api_base() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    5000
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            request_timeout_ms: default_request_timeout(),
            reconnect: ReconnectSettings::default(),
        }
    }
}

impl SessionSettings {
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            base_url: self.api_base.clone(),
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

/// Live feed reconnect timing
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: u32,

    /// Give up after this many consecutive failures; unset retries forever
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_multiplier() -> u32 {
    2
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            max_attempts: None,
        }
    }
}

impl ReconnectSettings {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(self.initial_delay_ms)),
            multiplier: self.multiplier,
            max_attempts: self.max_attempts,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingSettings {
    /// Install the global subscriber; `RUST_LOG` wins over `level`
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("herbst={},tower_http=info", self.level)));

        let registry = tracing_subscriber::registry().with(filter);
        let result = if self.format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json()).try_init()
        } else {
            registry.with(tracing_subscriber::fmt::layer()).try_init()
        };

        if let Err(e) = result {
            eprintln!("Logging already initialized: {}", e);
        }
    }
}

impl Settings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        settings.apply_env_overrides(|name| std::env::var(name).ok());
        settings
    }

    /// Load a file and apply environment overrides
    pub fn load_with_env(path: &Path) -> Result<Self, SettingsError> {
        let mut settings = Self::load(path)?;
        settings.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Load from an explicit path, the default locations, or the
    /// environment alone; also returns the file that was used
    ///
    /// Runs before logging is set up, so problems go to stderr.
    pub fn load_default(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), SettingsError> {
        if let Some(path) = explicit {
            return Ok((Self::load_with_env(path)?, Some(path.to_path_buf())));
        }

        let candidates = [
            dirs::config_dir().map(|p| p.join("herbst").join("herbst.toml")),
            Some(PathBuf::from("/etc/herbst/herbst.toml")),
            Some(PathBuf::from("./herbst.toml")),
        ];

        for path in candidates.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(settings) => return Ok((settings, Some(path.clone()))),
                    Err(e) => eprintln!("Skipping unreadable settings: {}", e),
                }
            }
        }

        Ok((Self::from_env(), None))
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("HERBST_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("HERBST_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid HERBST_PORT"),
            }
        }
        if let Some(dir) = var(ENV_CONFIG_DIR) {
            self.server.config_dir = Some(dir);
        }
        if let Some(dir) = var("HERBST_STATIC_DIR") {
            self.server.static_dir = dir;
        }
        if let Some(base) = var("HERBST_API_BASE") {
            self.session.api_base = base;
        }
        if let Some(level) = var("HERBST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("HERBST_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse settings file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Content for a fresh `herbst.toml`
pub fn generate_default_settings() -> String {
    r#"# herbst process settings
#
# Environment variables override these settings:
# - HERBST_HOST, HERBST_PORT
# - HERBST_CONFIG_DIR, HERBST_STATIC_DIR
# - HERBST_API_BASE
# - HERBST_LOG_LEVEL, HERBST_LOG_FORMAT

[server]
host = "0.0.0.0"
port = 8080

# Directory with config.toml and themes.toml.
# Unset: ./runtime/config if it exists, otherwise /app/config
# config_dir = "/srv/herbst"

static_dir = "./static"

# Reload when config.toml or themes.toml change on disk
watch = true
watch_debounce_ms = 500

[session]
api_base = "http://localhost:8080"
request_timeout_ms = 5000

[session.reconnect]
initial_delay_ms = 1000
max_delay_ms = 30000
multiplier = 2
# max_attempts = 10

[logging]
# trace, debug, info, warn, error
level = "info"

# pretty (development) or json (production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.addr(), "0.0.0.0:8080");
        assert_eq!(settings.session.api_base, "http://localhost:8080");
        assert_eq!(settings.session.reconnect.policy(), ReconnectPolicy::default());
        assert_eq!(settings.logging.format, "pretty");
    }

    #[test]
    fn test_generated_settings_parse() {
        let settings: Settings = toml::from_str(&generate_default_settings()).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.session.reconnect.max_delay_ms, 30_000);
        assert!(settings.server.config_dir.is_none());
        assert!(settings.server.watch);
        assert_eq!(settings.server.watch_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("herbst.toml");
        std::fs::write(
            &path,
            "[session.reconnect]\ninitial_delay_ms = 250\nmax_attempts = 3\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        let policy = settings.session.reconnect.policy();
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.max_attempts, Some(3));
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn test_load_default_reports_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("herbst.toml");
        std::fs::write(&path, "[server]\nport = 9100\n").unwrap();

        let (settings, source) = Settings::load_default(Some(&path)).unwrap();
        assert_eq!(source, Some(path));
        assert_eq!(settings.server.port, 9100);

        assert!(Settings::load_default(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_parse_error_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("herbst.toml");
        std::fs::write(&path, "[server\nport = 1").unwrap();

        assert!(matches!(Settings::load(&path), Err(SettingsError::Parse { .. })));
        assert!(matches!(
            Settings::load(&dir.path().join("missing.toml")),
            Err(SettingsError::Io { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("HERBST_PORT", "9000"),
            ("HERBST_CONFIG_DIR", "/srv/herbst"),
            ("HERBST_API_BASE", "http://dash:9000"),
            ("HERBST_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.resolved_config_dir(), PathBuf::from("/srv/herbst"));
        assert_eq!(settings.session.api_base, "http://dash:9000");
        assert_eq!(settings.logging.format, "json");
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_port_ignored() {
        let mut settings = Settings::default();
        settings.apply_env_overrides(|name| (name == "HERBST_PORT").then(|| "eighty".to_string()));
        assert_eq!(settings.server.port, 8080);
    }
}
