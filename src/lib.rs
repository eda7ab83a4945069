//! # herbst
//!
//! Homelab start page: a configurable set of service links, sectioned
//! navigation and live widgets (weather, containers, host resources) inside
//! a themeable shell.
//!
//! ## Modules
//!
//! - [`schema`]: canonical configuration, schema revisions and validation
//! - [`theme`]: theme variables projected onto a rendering root, theme catalog
//! - [`icon`]: service icon resolution
//! - [`loader`]: one-shot configuration fetch with a safe fallback
//! - [`live`]: per-feed push-stream lifecycle and the live widget state
//! - [`server`]: the backend serving `/api/config` and `/api/events`
//! - [`config`]: process settings and logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use herbst::config::Settings;
//! use herbst::live::{LiveStateStore, SseChannel};
//! use herbst::loader::ConfigLoader;
//! use herbst::theme::{RootStyle, ThemeApplier};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env();
//!
//!     // Never fails: falls back to a minimal configuration
//!     let loaded = ConfigLoader::new(settings.session.loader_config())?
//!         .load_or_fallback()
//!         .await;
//!
//!     let mut theme = ThemeApplier::new(RootStyle::default());
//!     theme.apply(&loaded.config.theme_vars);
//!
//!     let channel = Arc::new(SseChannel::new(&settings.session.api_base)?);
//!     let store = LiveStateStore::start(
//!         &loaded.config,
//!         channel,
//!         settings.session.reconnect.policy(),
//!     );
//!
//!     println!("{:?}", store.snapshot().system.data);
//!     store.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod icon;
pub mod live;
pub mod loader;
pub mod schema;
pub mod server;
pub mod theme;

pub use schema::{validate, Feed, HerbstConfig, Service, ServiceSection, ValidationError};

pub use theme::{RootStyle, StyleSurface, ThemeApplier, ThemeCatalog};

pub use loader::{ConfigLoader, FetchError, LoadError, Loaded, LoaderConfig};

pub use live::{
    ChannelError, EventChannel, FeedIssue, FeedState, LiveEvent, LiveSnapshot, LiveStateStore,
    ReconnectPolicy, SseChannel,
};

pub use server::{build_router, serve, ApiError, AppState, DashboardStore, EventHub};

pub use config::{LoggingSettings, ServerSettings, SessionSettings, Settings, SettingsError};
