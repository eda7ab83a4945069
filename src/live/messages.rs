//! Live Event Types
//!
//! Payloads carried on the `/api/events` stream. The server and the client
//! share these types: the hub encodes them into SSE frames and the feed
//! runners decode them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::Feed;

/// SSE event name announcing an open stream
pub const CONNECTED_EVENT: &str = "connected";

/// SSE event name announcing a server-side configuration change
pub const RELOAD_EVENT: &str = "reload";

/// One frame from the event stream, before decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event: String,
    pub data: String,
}

impl RawEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Current weather reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherData {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub description: String,
    pub icon: String,
    pub city: String,
}

/// Weather event payload: a reading, or the provider's failure message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeatherEvent {
    Reading(WeatherData),
    Failed { error: String },
}

/// A container as reported by the Docker backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
    /// Creation time, Unix seconds on the wire
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
}

/// Docker event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DockerEvent {
    /// Full container list; replaces the live set
    Snapshot { containers: Vec<DockerContainer> },
    /// Incremental change keyed by container id
    Delta {
        #[serde(default)]
        upserted: Vec<DockerContainer>,
        #[serde(default)]
        removed: Vec<String>,
    },
}

/// Host resource usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemStats {
    pub cpu_percent: f64,
    pub memory_used: u64,
    pub memory_total: u64,
    pub disk_used: u64,
    pub disk_total: u64,
    pub uptime_secs: u64,
}

impl SystemStats {
    pub fn memory_percent(&self) -> Option<f64> {
        percent(self.memory_used, self.memory_total)
    }

    pub fn disk_percent(&self) -> Option<f64> {
        percent(self.disk_used, self.disk_total)
    }
}

fn percent(used: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| used as f64 / total as f64 * 100.0)
}

/// A decoded event
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Connected,
    Reload,
    Weather(WeatherEvent),
    Docker(DockerEvent),
    System(SystemStats),
}

/// An event frame that could not be decoded
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid {event} payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {event} payload: {reason}")]
    OutOfRange { event: String, reason: String },
}

impl LiveEvent {
    /// Decode a raw frame; unknown event names yield `Ok(None)`
    pub fn decode(raw: &RawEvent) -> Result<Option<LiveEvent>, DecodeError> {
        let payload_err = |source: serde_json::Error| DecodeError::Payload {
            event: raw.event.clone(),
            source,
        };

        let event = match raw.event.as_str() {
            CONNECTED_EVENT => LiveEvent::Connected,
            RELOAD_EVENT => LiveEvent::Reload,
            other => match Feed::parse(other) {
                Some(feed) => Self::decode_payload(feed, &raw.data).map_err(|e| match e {
                    PayloadError::Json(source) => payload_err(source),
                    PayloadError::Range(reason) => DecodeError::OutOfRange {
                        event: raw.event.clone(),
                        reason,
                    },
                })?,
                None => return Ok(None),
            },
        };
        Ok(Some(event))
    }

    /// Decode the JSON payload published for a feed
    pub fn from_payload(feed: Feed, data: &str) -> Result<LiveEvent, DecodeError> {
        Self::decode(&RawEvent::new(feed.as_str(), data))?.ok_or_else(|| DecodeError::OutOfRange {
            event: feed.to_string(),
            reason: "unknown event".to_string(),
        })
    }

    fn decode_payload(feed: Feed, data: &str) -> Result<LiveEvent, PayloadError> {
        match feed {
            Feed::Weather => {
                let event: WeatherEvent = serde_json::from_str(data)?;
                if let WeatherEvent::Reading(reading) = &event {
                    if !(0.0..=100.0).contains(&reading.humidity) {
                        return Err(PayloadError::Range(format!(
                            "humidity {} outside 0-100",
                            reading.humidity
                        )));
                    }
                }
                Ok(LiveEvent::Weather(event))
            }
            Feed::Docker => Ok(LiveEvent::Docker(serde_json::from_str(data)?)),
            Feed::System => Ok(LiveEvent::System(serde_json::from_str(data)?)),
        }
    }

    /// Feed this event belongs to; control events belong to none
    pub fn feed(&self) -> Option<Feed> {
        match self {
            LiveEvent::Weather(_) => Some(Feed::Weather),
            LiveEvent::Docker(_) => Some(Feed::Docker),
            LiveEvent::System(_) => Some(Feed::System),
            LiveEvent::Connected | LiveEvent::Reload => None,
        }
    }

    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::Connected => CONNECTED_EVENT,
            LiveEvent::Reload => RELOAD_EVENT,
            LiveEvent::Weather(_) => Feed::Weather.as_str(),
            LiveEvent::Docker(_) => Feed::Docker.as_str(),
            LiveEvent::System(_) => Feed::System.as_str(),
        }
    }

    /// Encode into an SSE frame
    pub fn encode(&self) -> Result<RawEvent, serde_json::Error> {
        let data = match self {
            LiveEvent::Connected => "ok".to_string(),
            LiveEvent::Reload => RELOAD_EVENT.to_string(),
            LiveEvent::Weather(event) => serde_json::to_string(event)?,
            LiveEvent::Docker(event) => serde_json::to_string(event)?,
            LiveEvent::System(stats) => serde_json::to_string(stats)?,
        };
        Ok(RawEvent::new(self.name(), data))
    }
}

enum PayloadError {
    Json(serde_json::Error),
    Range(String),
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        PayloadError::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_weather_reading() {
        let raw = RawEvent::new(
            "weather",
            r#"{"temp": 12.5, "feelsLike": 10.1, "humidity": 81, "description": "light rain", "icon": "10d", "city": "Berlin"}"#,
        );
        match LiveEvent::decode(&raw).unwrap() {
            Some(LiveEvent::Weather(WeatherEvent::Reading(data))) => {
                assert_eq!(data.city, "Berlin");
                assert_eq!(data.humidity, 81.0);
            }
            other => panic!("Expected weather reading, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_weather_failure() {
        let raw = RawEvent::new("weather", r#"{"enabled": true, "error": "City not found"}"#);
        assert_eq!(
            LiveEvent::decode(&raw).unwrap(),
            Some(LiveEvent::Weather(WeatherEvent::Failed {
                error: "City not found".to_string()
            }))
        );
    }

    #[test]
    fn test_decode_weather_humidity_out_of_range() {
        let raw = RawEvent::new(
            "weather",
            r#"{"temp": 1, "feelsLike": 1, "humidity": 140, "description": "", "icon": "", "city": ""}"#,
        );
        assert!(matches!(
            LiveEvent::decode(&raw),
            Err(DecodeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_decode_docker_snapshot() {
        let raw = RawEvent::new(
            "docker",
            r#"{"kind": "snapshot", "containers": [{"id": "c1", "name": "web", "image": "nginx", "state": "running", "status": "Up 2 hours", "created": 1700000000}]}"#,
        );
        match LiveEvent::decode(&raw).unwrap() {
            Some(LiveEvent::Docker(DockerEvent::Snapshot { containers })) => {
                assert_eq!(containers.len(), 1);
                assert_eq!(containers[0].created.timestamp(), 1_700_000_000);
            }
            other => panic!("Expected docker snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_docker_delta_defaults() {
        let raw = RawEvent::new("docker", r#"{"kind": "delta", "removed": ["c1"]}"#);
        assert_eq!(
            LiveEvent::decode(&raw).unwrap(),
            Some(LiveEvent::Docker(DockerEvent::Delta {
                upserted: vec![],
                removed: vec!["c1".to_string()],
            }))
        );
    }

    #[test]
    fn test_decode_system() {
        let raw = RawEvent::new(
            "system",
            r#"{"cpuPercent": 12.5, "memoryUsed": 512, "memoryTotal": 2048, "uptimeSecs": 60}"#,
        );
        match LiveEvent::decode(&raw).unwrap() {
            Some(LiveEvent::System(stats)) => {
                assert_eq!(stats.memory_percent(), Some(25.0));
                assert_eq!(stats.disk_percent(), None);
            }
            other => panic!("Expected system stats, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_control_and_unknown() {
        assert_eq!(
            LiveEvent::decode(&RawEvent::new("connected", "ok")).unwrap(),
            Some(LiveEvent::Connected)
        );
        assert_eq!(
            LiveEvent::decode(&RawEvent::new("reload", "reload")).unwrap(),
            Some(LiveEvent::Reload)
        );
        assert_eq!(LiveEvent::decode(&RawEvent::new("message", "{}")).unwrap(), None);
    }

    #[test]
    fn test_decode_malformed() {
        let raw = RawEvent::new("docker", "{\"kind\": \"sideways\"}");
        assert!(matches!(LiveEvent::decode(&raw), Err(DecodeError::Payload { .. })));
    }

    #[test]
    fn test_encode_names_frame_after_feed() {
        let event = LiveEvent::System(SystemStats::default());
        let raw = event.encode().unwrap();
        assert_eq!(raw.event, "system");
        assert_eq!(LiveEvent::decode(&raw).unwrap(), Some(event));
    }
}
