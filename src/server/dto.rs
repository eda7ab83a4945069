//! Response bodies for the non-configuration endpoints.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub subscribers: usize,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub event: String,
    /// Subscribers that received the event
    pub delivered: usize,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub title: String,
    pub theme: String,
    pub delivered: usize,
}
