//! Live Widget State
//!
//! Keeps weather, container and system widgets current from the
//! `/api/events` push stream.
//!
//! - **messages**: event payloads shared with the server
//! - **machine**: per-feed lifecycle and reconnect backoff
//! - **channel**: the push channel abstraction and its SSE implementation
//! - **store**: the session-wide [`LiveStateStore`] and its snapshot reducer
//!
//! # Example
//!
//! ```rust,no_run
//! use herbst::live::{LiveStateStore, ReconnectPolicy, SseChannel};
//! use herbst::schema::validate;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = validate(&json!({
//!         "title": "homelab",
//!         "theme": "default",
//!         "services": [],
//!         "system": {"enabled": true}
//!     }))?;
//!     let channel = Arc::new(SseChannel::new("http://localhost:8080")?);
//!
//!     let store = LiveStateStore::start(&config, channel, ReconnectPolicy::default());
//!     // wakes on the system feed's next state or data change
//!     let mut updates = store.subscribe();
//!     updates.changed().await?;
//!     println!("{:?}", updates.borrow().system.data);
//!
//!     store.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
mod feed;
pub mod machine;
pub mod messages;
pub mod store;

pub use channel::{ChannelError, EventChannel, EventStream, SseChannel, SseDecoder};
pub use machine::{Backoff, FeedMachine, FeedState, InvalidTransition, ReconnectPolicy, Retry};
pub use messages::{
    DecodeError, DockerContainer, DockerEvent, LiveEvent, RawEvent, SystemStats, WeatherData,
    WeatherEvent, CONNECTED_EVENT, RELOAD_EVENT,
};
pub use store::{FeedIssue, FeedStatus, FeedView, LiveSnapshot, LiveStateStore};
