//! Canonical Configuration Types
//!
//! The in-memory shape of a validated dashboard configuration. Every type
//! here serializes to the camelCase wire format served at `/api/config`;
//! deserialization goes through [`super::validate`] instead of serde so
//! that older payloads get their defaults and errors carry field paths.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Default Docker socket location
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Default disk path sampled by the system widget
pub const DEFAULT_DISK_PATH: &str = "/";

/// Root dashboard configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HerbstConfig {
    pub title: String,
    pub ui: UiConfig,
    pub weather: WeatherConfig,
    pub docker: DockerConfig,
    pub system: SystemConfig,
    /// Legacy flat service list
    pub services: Vec<Service>,
    /// Grouped services, preferred over `services`
    pub sections: Vec<ServiceSection>,
    /// Named theme identifier
    pub theme: String,
    /// CSS variable name (without `--`) to value
    pub theme_vars: BTreeMap<String, String>,
}

/// A single navigable link
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub online_badge: bool,
}

impl Service {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            icon: None,
            online_badge: false,
        }
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn online_badge(mut self, enabled: bool) -> Self {
        self.online_badge = enabled;
        self
    }

    /// Icon reference to render, if any
    pub fn icon_src(&self) -> Option<&str> {
        crate::icon::resolve(self.icon.as_deref())
    }
}

/// A titled group of services
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSection {
    pub title: String,
    pub services: Vec<Service>,
}

/// Presentation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<ClockConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockConfig {
    pub time_format: TimeFormat,
    pub date_format: DateFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHour,
    #[serde(rename = "12h")]
    TwelveHour,
}

impl TimeFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(Self::TwentyFourHour),
            "12h" => Some(Self::TwelveHour),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    #[default]
    Short,
    Numeric,
}

impl DateFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "short" => Some(Self::Short),
            "numeric" => Some(Self::Numeric),
            _ => None,
        }
    }
}

/// Measurement units passed through to the weather provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    /// Empty string maps to the default, matching older servers that
    /// emitted `""` for an unset unit.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "metric" => Some(Self::Metric),
            "imperial" => Some(Self::Imperial),
            "standard" => Some(Self::Standard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
            Self::Standard => "standard",
        }
    }
}

/// Weather widget configuration
///
/// Coordinates are NaN when a payload carried a weather section without
/// them, so an enabled feed with neither location nor coordinates is
/// detectable by [`WeatherConfig::target`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherConfig {
    pub enabled: bool,
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub units: Units,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            location: None,
            lat: 0.0,
            lon: 0.0,
            units: Units::Metric,
        }
    }
}

/// Where the weather provider should be queried
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherTarget {
    Location(String),
    Coordinates { lat: f64, lon: f64 },
}

/// Weather is enabled but has nothing to query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("weather is enabled but neither a location nor valid coordinates are configured")]
pub struct WeatherConfigError;

impl WeatherConfigError {
    /// Hint shown in the widget instead of a reading
    pub fn hint(&self) -> &'static str {
        "Set weather.location or valid weather.lat (-90..90) / weather.lon (-180..180)"
    }
}

impl WeatherConfig {
    /// Resolve what to query; a non-empty location wins over coordinates
    pub fn target(&self) -> Result<WeatherTarget, WeatherConfigError> {
        if let Some(location) = self.location.as_deref() {
            let trimmed = location.trim();
            if !trimmed.is_empty() {
                return Ok(WeatherTarget::Location(trimmed.to_string()));
            }
        }

        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lon_ok = self.lon.is_finite() && (-180.0..=180.0).contains(&self.lon);
        if lat_ok && lon_ok {
            Ok(WeatherTarget::Coordinates {
                lat: self.lat,
                lon: self.lon,
            })
        } else {
            Err(WeatherConfigError)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerConfig {
    pub enabled: bool,
    pub socket_path: String,
    pub agents_configured: bool,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            socket_path: DEFAULT_DOCKER_SOCKET.to_string(),
            agents_configured: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    pub enabled: bool,
    pub disk_path: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            disk_path: DEFAULT_DISK_PATH.to_string(),
        }
    }
}

/// One independently-lifecycled live data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Weather,
    Docker,
    System,
}

impl Feed {
    pub const ALL: [Feed; 3] = [Feed::Weather, Feed::Docker, Feed::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Weather => "weather",
            Feed::Docker => "docker",
            Feed::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weather" => Some(Feed::Weather),
            "docker" => Some(Feed::Docker),
            "system" => Some(Feed::System),
            _ => None,
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HerbstConfig {
    /// Minimal configuration used when nothing could be loaded
    pub fn fallback() -> Self {
        Self {
            title: "herbst".to_string(),
            ui: UiConfig::default(),
            weather: WeatherConfig::default(),
            docker: DockerConfig::default(),
            system: SystemConfig::default(),
            services: Vec::new(),
            sections: Vec::new(),
            theme: "default".to_string(),
            theme_vars: BTreeMap::new(),
        }
    }

    /// Whether the backend feature behind a feed is enabled
    pub fn feed_enabled(&self, feed: Feed) -> bool {
        match feed {
            Feed::Weather => self.weather.enabled,
            Feed::Docker => self.docker.enabled,
            Feed::System => self.system.enabled,
        }
    }

    /// Merge `sections` and legacy `services` into one display list
    ///
    /// Configured sections come first in order. Legacy services whose name
    /// is not already claimed by any section follow in a trailing untitled
    /// section.
    pub fn display_sections(&self) -> Vec<ServiceSection> {
        let claimed: HashSet<&str> = self
            .sections
            .iter()
            .flat_map(|section| section.services.iter().map(|s| s.name.as_str()))
            .collect();

        let mut seen = HashSet::new();
        let leftovers: Vec<Service> = self
            .services
            .iter()
            .filter(|s| !claimed.contains(s.name.as_str()) && seen.insert(s.name.as_str()))
            .cloned()
            .collect();

        let mut merged = self.sections.clone();
        if !leftovers.is_empty() {
            merged.push(ServiceSection {
                title: String::new(),
                services: leftovers,
            });
        }
        merged
    }
}
