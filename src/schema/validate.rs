//! Payload Normalization
//!
//! Turns a loosely-shaped JSON document into a canonical [`HerbstConfig`].
//! Sections introduced after v1 are optional and default-filled; required
//! fields and mistyped fields fail with the path of the offending field.
//! `null` is treated the same as an absent field.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use super::error::{FieldPath, ValidationError, ValidationResult};
use super::types::*;

/// Parse and validate a configuration body
pub fn validate_str(body: &str) -> ValidationResult<HerbstConfig> {
    let raw: Value =
        serde_json::from_str(body).map_err(|e| ValidationError::Syntax(e.to_string()))?;
    validate(&raw)
}

/// Validate a decoded configuration payload
pub fn validate(raw: &Value) -> ValidationResult<HerbstConfig> {
    let root = Object::root(raw)?;

    let title = root.required_str("title")?;
    let theme = root.required_str("theme")?;

    let ui = match root.object("ui")? {
        Some(ui) => parse_ui(&ui)?,
        None => UiConfig::default(),
    };
    let weather = match root.object("weather")? {
        Some(weather) => parse_weather(&weather)?,
        None => WeatherConfig::default(),
    };
    let docker = match root.object("docker")? {
        Some(docker) => parse_docker(&docker)?,
        None => DockerConfig::default(),
    };
    let system = match root.object("system")? {
        Some(system) => parse_system(&system)?,
        None => SystemConfig::default(),
    };

    let services = match root.array("services")? {
        Some((path, items)) => parse_services(&path, items)?,
        None => Vec::new(),
    };

    let mut sections = Vec::new();
    if let Some((path, items)) = root.array("sections")? {
        for (i, item) in items.iter().enumerate() {
            let section = Object::at(path.index(i), item)?;
            sections.push(parse_section(&section)?);
        }
    }

    let theme_vars = match root.object("themeVars")? {
        Some(vars) => parse_theme_vars(&vars)?,
        None => BTreeMap::new(),
    };

    Ok(HerbstConfig {
        title,
        ui,
        weather,
        docker,
        system,
        services,
        sections,
        theme,
        theme_vars,
    })
}

fn parse_ui(ui: &Object<'_>) -> ValidationResult<UiConfig> {
    let background = match ui.object("background")? {
        Some(bg) => {
            let blur = bg.f64("blur")?;
            if let Some(b) = blur {
                if !b.is_finite() || b < 0.0 {
                    return Err(ValidationError::Invalid {
                        path: bg.path.key("blur"),
                        reason: "must be a non-negative number".to_string(),
                    });
                }
            }
            Some(BackgroundConfig {
                image: bg.str("image")?,
                blur,
            })
        }
        None => None,
    };

    let clock = match ui.object("clock")? {
        Some(clock) => Some(ClockConfig {
            time_format: clock
                .enumeration("timeFormat", TimeFormat::parse, "one of 24h, 12h")?
                .unwrap_or_default(),
            date_format: clock
                .enumeration("dateFormat", DateFormat::parse, "one of short, numeric")?
                .unwrap_or_default(),
        }),
        None => None,
    };

    Ok(UiConfig {
        background,
        font: ui.str("font")?,
        clock,
    })
}

fn parse_weather(weather: &Object<'_>) -> ValidationResult<WeatherConfig> {
    Ok(WeatherConfig {
        enabled: weather.bool("enabled")?.unwrap_or(false),
        api_key: weather.str("apiKey")?.unwrap_or_default(),
        location: weather.str("location")?,
        lat: weather.f64("lat")?.unwrap_or(f64::NAN),
        lon: weather.f64("lon")?.unwrap_or(f64::NAN),
        units: weather
            .enumeration("units", Units::parse, "one of metric, imperial, standard")?
            .unwrap_or_default(),
    })
}

fn parse_docker(docker: &Object<'_>) -> ValidationResult<DockerConfig> {
    let defaults = DockerConfig::default();
    Ok(DockerConfig {
        enabled: docker.bool("enabled")?.unwrap_or(defaults.enabled),
        socket_path: docker
            .str("socketPath")?
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.socket_path),
        agents_configured: docker
            .bool("agentsConfigured")?
            .unwrap_or(defaults.agents_configured),
    })
}

fn parse_system(system: &Object<'_>) -> ValidationResult<SystemConfig> {
    let defaults = SystemConfig::default();
    Ok(SystemConfig {
        enabled: system.bool("enabled")?.unwrap_or(defaults.enabled),
        disk_path: system
            .str("diskPath")?
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.disk_path),
    })
}

fn parse_section(section: &Object<'_>) -> ValidationResult<ServiceSection> {
    let services = match section.array("services")? {
        Some((path, items)) => parse_services(&path, items)?,
        None => Vec::new(),
    };
    Ok(ServiceSection {
        title: section.str("title")?.unwrap_or_default(),
        services,
    })
}

fn parse_services(path: &FieldPath, items: &[Value]) -> ValidationResult<Vec<Service>> {
    let mut names = HashSet::new();
    let mut services = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let obj = Object::at(path.index(i), item)?;
        let service = Service {
            name: obj.required_str("name")?,
            url: obj.required_str("url")?,
            icon: obj.str("icon")?,
            online_badge: obj.bool("onlineBadge")?.unwrap_or(false),
        };

        if !names.insert(service.name.clone()) {
            return Err(ValidationError::Invalid {
                path: obj.path.key("name"),
                reason: format!("duplicate service name '{}'", service.name),
            });
        }
        services.push(service);
    }

    Ok(services)
}

fn parse_theme_vars(vars: &Object<'_>) -> ValidationResult<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (key, value) in vars.map {
        let path = vars.path.key(key);
        if !crate::theme::is_valid_var_name(key) {
            return Err(ValidationError::Invalid {
                path,
                reason: "theme variable names may only contain letters, digits, '-' and '_'"
                    .to_string(),
            });
        }
        match value {
            Value::String(s) => {
                out.insert(key.clone(), s.clone());
            }
            other => {
                return Err(ValidationError::WrongType {
                    path,
                    expected: "a string",
                    found: kind(other),
                })
            }
        }
    }
    Ok(out)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A JSON object together with its location in the payload
struct Object<'a> {
    path: FieldPath,
    map: &'a Map<String, Value>,
}

impl<'a> Object<'a> {
    fn root(value: &'a Value) -> ValidationResult<Self> {
        Self::at(FieldPath::root(), value)
    }

    fn at(path: FieldPath, value: &'a Value) -> ValidationResult<Self> {
        match value {
            Value::Object(map) => Ok(Self { path, map }),
            other => Err(ValidationError::WrongType {
                path,
                expected: "an object",
                found: kind(other),
            }),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn wrong(&self, key: &str, expected: &'static str, found: &Value) -> ValidationError {
        ValidationError::WrongType {
            path: self.path.key(key),
            expected,
            found: kind(found),
        }
    }

    fn required_str(&self, key: &str) -> ValidationResult<String> {
        self.str(key)?.ok_or_else(|| ValidationError::Missing {
            path: self.path.key(key),
        })
    }

    fn str(&self, key: &str) -> ValidationResult<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.wrong(key, "a string", other)),
        }
    }

    fn bool(&self, key: &str) -> ValidationResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.wrong(key, "a boolean", other)),
        }
    }

    fn f64(&self, key: &str) -> ValidationResult<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(other) => Err(self.wrong(key, "a number", other)),
        }
    }

    fn enumeration<T>(
        &self,
        key: &str,
        parse: fn(&str) -> Option<T>,
        allowed: &'static str,
    ) -> ValidationResult<Option<T>> {
        match self.str(key)? {
            None => Ok(None),
            Some(s) => parse(&s).map(Some).ok_or_else(|| ValidationError::Invalid {
                path: self.path.key(key),
                reason: format!("'{}' is not {}", s, allowed),
            }),
        }
    }

    fn object(&self, key: &str) -> ValidationResult<Option<Object<'a>>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => Object::at(self.path.key(key), value).map(Some),
        }
    }

    fn array(&self, key: &str) -> ValidationResult<Option<(FieldPath, &'a [Value])>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some((self.path.key(key), items.as_slice()))),
            Some(other) => Err(self.wrong(key, "an array", other)),
        }
    }
}
