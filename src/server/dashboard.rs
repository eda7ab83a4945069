//! Dashboard Files
//!
//! Reads `config.toml` and `themes.toml` from the config directory and
//! turns them into the [`HerbstConfig`] served at `/api/config`.
//!
//! `${VAR}` references in string values are expanded from the environment;
//! unknown variables stay verbatim. The result is run through the same
//! validator clients use, so the server never serves what a client would
//! reject.

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::schema::{self, HerbstConfig, ValidationError, DEFAULT_DISK_PATH, DEFAULT_DOCKER_SOCKET};
use crate::theme::{ThemeCatalog, DEFAULT_THEMES_TOML};

pub const ENV_CONFIG_DIR: &str = "HERBST_CONFIG_DIR";
pub const DEV_CONFIG_DIR: &str = "./runtime/config";
pub const CONTAINER_CONFIG_DIR: &str = "/app/config";
pub const CONFIG_FILENAME: &str = "config.toml";
pub const THEMES_FILENAME: &str = "themes.toml";

/// `config.toml` written when none exists
pub const DEFAULT_CONFIG_TOML: &str = r##"# herbst configuration
#
# Use ${ENV_VAR_NAME} anywhere in a string to reference an environment variable.

title = "herbst"
theme = "Default"   # key or display name from themes.toml

[ui]
font = ""

[ui.background]
image = ""          # file under /static or a full URL
blur = 0

[ui.clock]
time-format = "24h" # 24h or 12h
date-format = "short"

[weather]
enabled = false
api-key = "${OPENWEATHER_API_KEY}"
location = ""       # "London,GB", or leave empty to use lat/lon
lat = 0.0
lon = 0.0
units = "metric"    # metric, imperial, standard

[docker]
socket-path = "/var/run/docker.sock"
# enabled = true    # auto-detected from the socket when unset

# [[docker.agent]]
# name = "server1"
# token = "${AGENT_TOKEN}"

[system]
enabled = true
disk-path = "/"

[[section]]
title = "Home"

[[section.service]]
name = "Home Assistant"
url = "https://ha.local"
online-badge = true

[[section.service]]
name = "NAS"
url = "https://nas.local"
online-badge = true
"##;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Failed to access {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Environment expansion failed: {0}")]
    Pattern(String),

    #[error("Dashboard configuration rejected: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Failed to watch dashboard files: {0}")]
    Watch(String),
}

/// `config.toml` as written by the user
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DashboardFile {
    pub title: String,
    pub theme: String,
    pub ui: UiFile,
    pub weather: WeatherFile,
    pub docker: DockerFile,
    pub system: SystemFile,
    /// Legacy flat list
    pub services: Vec<ServiceFile>,
    #[serde(rename = "section")]
    pub sections: Vec<SectionFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UiFile {
    pub font: String,
    pub background: Option<BackgroundFile>,
    pub clock: Option<ClockFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BackgroundFile {
    pub image: String,
    pub blur: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ClockFile {
    pub time_format: String,
    pub date_format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WeatherFile {
    pub enabled: bool,
    pub api_key: String,
    pub location: String,
    pub lat: f64,
    pub lon: f64,
    pub units: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DockerFile {
    /// Unset means: enabled if the socket exists
    pub enabled: Option<bool>,
    /// Address remote agents use to reach this server
    pub host: String,
    pub socket_path: String,
    #[serde(rename = "agent", alias = "agents")]
    pub agents: Vec<AgentFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentFile {
    pub name: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SystemFile {
    pub enabled: bool,
    pub disk_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServiceFile {
    pub name: String,
    pub url: String,
    pub icon: String,
    pub online_badge: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SectionFile {
    pub title: String,
    #[serde(rename = "service")]
    pub services: Vec<ServiceFile>,
}

/// Expands `${VAR}` references
pub struct EnvExpander<F> {
    pattern: Regex,
    lookup: F,
}

impl EnvExpander<fn(&str) -> Option<String>> {
    /// Expander backed by the process environment
    pub fn from_env() -> Result<Self, DashboardError> {
        fn lookup(name: &str) -> Option<String> {
            std::env::var(name).ok()
        }
        Self::new(lookup as fn(&str) -> Option<String>)
    }
}

impl<F: Fn(&str) -> Option<String>> EnvExpander<F> {
    pub fn new(lookup: F) -> Result<Self, DashboardError> {
        let pattern = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DashboardError::Pattern(e.to_string()))?;
        Ok(Self { pattern, lookup })
    }

    pub fn expand(&self, value: &str) -> String {
        self.pattern
            .replace_all(value, |caps: &regex::Captures<'_>| {
                (self.lookup)(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    fn expand_in_place(&self, value: &mut String) {
        if value.contains("${") {
            *value = self.expand(value);
        }
    }
}

impl DashboardFile {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Expand environment references in every string value
    pub fn expand_env<F: Fn(&str) -> Option<String>>(&mut self, env: &EnvExpander<F>) {
        env.expand_in_place(&mut self.title);
        env.expand_in_place(&mut self.theme);
        env.expand_in_place(&mut self.ui.font);
        if let Some(bg) = self.ui.background.as_mut() {
            env.expand_in_place(&mut bg.image);
        }
        env.expand_in_place(&mut self.weather.api_key);
        env.expand_in_place(&mut self.weather.location);
        env.expand_in_place(&mut self.weather.units);
        env.expand_in_place(&mut self.docker.host);
        env.expand_in_place(&mut self.docker.socket_path);
        for agent in &mut self.docker.agents {
            env.expand_in_place(&mut agent.name);
            env.expand_in_place(&mut agent.token);
        }
        env.expand_in_place(&mut self.system.disk_path);

        let services = self
            .services
            .iter_mut()
            .chain(self.sections.iter_mut().flat_map(|s| s.services.iter_mut()));
        for service in services {
            env.expand_in_place(&mut service.name);
            env.expand_in_place(&mut service.url);
            env.expand_in_place(&mut service.icon);
        }
        for section in &mut self.sections {
            env.expand_in_place(&mut section.title);
        }
    }

    /// Docker `enabled`, auto-detected from the socket when unset
    pub fn docker_enabled(&self) -> bool {
        self.docker
            .enabled
            .unwrap_or_else(|| Path::new(self.socket_path()).exists())
    }

    fn socket_path(&self) -> &str {
        if self.docker.socket_path.is_empty() {
            DEFAULT_DOCKER_SOCKET
        } else {
            &self.docker.socket_path
        }
    }

    /// Wire payload for `/api/config`
    pub fn to_payload(&self, themes: &ThemeCatalog) -> Value {
        let mut ui = Map::new();
        if !self.ui.font.is_empty() {
            ui.insert("font".into(), json!(self.ui.font));
        }
        if let Some(bg) = &self.ui.background {
            let mut background = Map::new();
            if !bg.image.is_empty() {
                background.insert("image".into(), json!(bg.image));
            }
            background.insert("blur".into(), json!(bg.blur));
            ui.insert("background".into(), Value::Object(background));
        }
        if let Some(clock) = &self.ui.clock {
            let mut c = Map::new();
            if !clock.time_format.is_empty() {
                c.insert("timeFormat".into(), json!(clock.time_format));
            }
            if !clock.date_format.is_empty() {
                c.insert("dateFormat".into(), json!(clock.date_format));
            }
            ui.insert("clock".into(), Value::Object(c));
        }

        let mut weather = json!({
            "enabled": self.weather.enabled,
            "apiKey": self.weather.api_key,
            "lat": self.weather.lat,
            "lon": self.weather.lon,
            "units": self.weather.units,
        });
        if !self.weather.location.is_empty() {
            weather["location"] = json!(self.weather.location);
        }

        let disk_path = if self.system.disk_path.is_empty() {
            DEFAULT_DISK_PATH
        } else {
            &self.system.disk_path
        };

        let service = |s: &ServiceFile| {
            let mut v = json!({"name": s.name, "url": s.url, "onlineBadge": s.online_badge});
            if !s.icon.is_empty() {
                v["icon"] = json!(s.icon);
            }
            v
        };

        json!({
            "title": self.title,
            "theme": self.theme,
            "ui": Value::Object(ui),
            "weather": weather,
            "docker": {
                "enabled": self.docker_enabled(),
                "socketPath": self.socket_path(),
                "agentsConfigured": !self.docker.agents.is_empty(),
            },
            "system": {
                "enabled": self.system.enabled,
                "diskPath": disk_path,
            },
            "services": self.services.iter().map(service).collect::<Vec<_>>(),
            "sections": self.sections.iter().map(|section| json!({
                "title": section.title,
                "services": section.services.iter().map(service).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
            "themeVars": themes.active(&self.theme).vars,
        })
    }

    /// Build and self-validate the served configuration
    pub fn into_config(self, themes: &ThemeCatalog) -> Result<HerbstConfig, DashboardError> {
        Ok(schema::validate(&self.to_payload(themes))?)
    }
}

/// Pick the config directory: explicit value, then the dev directory if it
/// exists, then the container path
pub fn resolve_config_dir(explicit: Option<&str>) -> PathBuf {
    if let Some(dir) = explicit.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    let dev = Path::new(DEV_CONFIG_DIR);
    if dev.exists() {
        return std::fs::canonicalize(dev).unwrap_or_else(|_| dev.to_path_buf());
    }

    PathBuf::from(CONTAINER_CONFIG_DIR)
}

/// Create the directory and any missing default files
pub fn ensure_defaults(dir: &Path) -> Result<(), DashboardError> {
    std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

    for (name, content) in [
        (CONFIG_FILENAME, DEFAULT_CONFIG_TOML),
        (THEMES_FILENAME, DEFAULT_THEMES_TOML),
    ] {
        let path = dir.join(name);
        if !path.exists() {
            std::fs::write(&path, content).map_err(|e| io_error(&path, e))?;
            tracing::info!(path = ?path, "Wrote default file");
        }
    }
    Ok(())
}

/// Read both files from `dir` and build the served configuration
pub fn load_dir(dir: &Path) -> Result<HerbstConfig, DashboardError> {
    ensure_defaults(dir)?;

    let themes_path = dir.join(THEMES_FILENAME);
    let themes = ThemeCatalog::from_toml(&read(&themes_path)?).map_err(|e| DashboardError::Parse {
        path: themes_path.clone(),
        error: e.to_string(),
    })?;

    let config_path = dir.join(CONFIG_FILENAME);
    let mut file = DashboardFile::from_toml(&read(&config_path)?).map_err(|e| DashboardError::Parse {
        path: config_path.clone(),
        error: e.to_string(),
    })?;
    file.expand_env(&EnvExpander::from_env()?);

    let config = file.into_config(&themes)?;
    tracing::info!(
        path = ?config_path,
        title = %config.title,
        theme = %config.theme,
        sections = config.sections.len(),
        "Dashboard configuration loaded"
    );
    Ok(config)
}

fn read(path: &Path) -> Result<String, DashboardError> {
    std::fs::read_to_string(path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, e: std::io::Error) -> DashboardError {
    DashboardError::Io {
        path: path.to_path_buf(),
        error: e.to_string(),
    }
}
