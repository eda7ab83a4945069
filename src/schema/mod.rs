//! Dashboard Configuration Schema
//!
//! One current schema plus a pure normalization function from whatever
//! revision the backend speaks to the canonical [`HerbstConfig`].
//!
//! - **types**: canonical configuration types and the services/sections merge
//! - **validate**: JSON payload to canonical config, with field paths on error
//! - **version**: schema revision detection
//! - **error**: validation errors
//!
//! # Example
//!
//! ```rust
//! use herbst::schema::{validate, Feed};
//! use serde_json::json;
//!
//! // A v1 payload: no weather, docker, system or sections
//! let config = validate(&json!({
//!     "title": "homelab",
//!     "theme": "Autumn",
//!     "services": [{"name": "NAS", "url": "https://nas.local"}]
//! })).unwrap();
//!
//! assert!(!config.feed_enabled(Feed::Weather));
//! assert_eq!(config.display_sections()[0].services[0].name, "NAS");
//! ```

pub mod error;
pub mod types;
pub mod validate;
pub mod version;

pub use error::{FieldPath, Segment, ValidationError, ValidationResult};
pub use types::{
    BackgroundConfig, ClockConfig, DateFormat, DockerConfig, Feed, HerbstConfig, Service,
    ServiceSection, SystemConfig, TimeFormat, UiConfig, Units, WeatherConfig, WeatherConfigError,
    WeatherTarget, DEFAULT_DISK_PATH, DEFAULT_DOCKER_SOCKET,
};
pub use validate::{validate, validate_str};
pub use version::{detect_version, SchemaVersion};
