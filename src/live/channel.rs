//! Event Channel
//!
//! The push channel a feed listens on. [`SseChannel`] reads the
//! `/api/events` Server-Sent Events stream over HTTP; tests inject their
//! own [`EventChannel`] implementations.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use std::collections::VecDeque;
use thiserror::Error;

use super::messages::RawEvent;
use crate::schema::Feed;

/// Stream of frames from one open channel; ends when the channel closes
pub type EventStream = BoxStream<'static, Result<RawEvent, ChannelError>>;

/// Push-stream transport failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Event stream rejected with HTTP {0}")]
    Status(u16),

    #[error("Event stream transport error: {0}")]
    Transport(String),

    #[error("Event stream closed unexpectedly")]
    Closed,
}

/// Source of per-feed event streams
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Open a fresh stream for `feed`
    async fn open(&self, feed: Feed) -> Result<EventStream, ChannelError>;
}

/// Incremental Server-Sent Events decoder
///
/// Accepts arbitrary byte chunks and yields complete frames. Only `event`
/// and `data` fields are interpreted; comments, `id` and `retry` are
/// ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every frame it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn line(&mut self, line: &str) -> Option<RawEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<RawEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(RawEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

/// HTTP Server-Sent Events channel
#[derive(Clone)]
pub struct SseChannel {
    client: Client,
    url: String,
}

impl SseChannel {
    /// Channel for the `/api/events` endpoint below `api_base`
    pub fn new(api_base: &str) -> Result<Self, ChannelError> {
        // No overall timeout: the stream is expected to stay open.
        let client = Client::builder()
            .build()
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        Ok(Self::with_client(client, api_base))
    }

    pub fn with_client(client: Client, api_base: &str) -> Self {
        Self {
            client,
            url: format!("{}/api/events", api_base.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventChannel for SseChannel {
    async fn open(&self, feed: Feed) -> Result<EventStream, ChannelError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("feed", feed.as_str())])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Status(status.as_u16()));
        }

        tracing::debug!(feed = %feed, url = %self.url, "Event stream opened");

        let bytes = response.bytes_stream().boxed();
        let state = (bytes, SseDecoder::new(), VecDeque::<RawEvent>::new(), false);

        let frames = stream::unfold(state, |(mut bytes, mut decoder, mut pending, done)| async move {
            loop {
                if let Some(frame) = pending.pop_front() {
                    return Some((Ok(frame), (bytes, decoder, pending, done)));
                }
                if done {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        return Some((
                            Err(ChannelError::Transport(e.to_string())),
                            (bytes, decoder, pending, true),
                        ))
                    }
                    None => return None,
                }
            }
        });

        Ok(frames.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: weather\ndata: {\"temp\":1}\n\n");
        assert_eq!(frames, vec![RawEvent::new("weather", "{\"temp\":1}")]);
    }

    #[test]
    fn test_decode_split_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: doc").is_empty());
        assert!(decoder.push(b"ker\r\ndata: {\"kind\":").is_empty());
        let frames = decoder.push(b"\"delta\"}\r\n\r\n");
        assert_eq!(frames, vec![RawEvent::new("docker", "{\"kind\":\"delta\"}")]);
    }

    #[test]
    fn test_decode_multiline_data_and_default_event() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: a\ndata: b\n\n");
        assert_eq!(frames, vec![RawEvent::new("message", "a\nb")]);
    }

    #[test]
    fn test_decode_ignores_comments_and_ids() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\n\nid: 7\nretry: 100\nevent: reload\ndata: reload\n\n");
        assert_eq!(frames, vec![RawEvent::new("reload", "reload")]);
    }

    #[test]
    fn test_decode_event_without_data_dropped() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: connected\n\n").is_empty());
        // the dangling name must not leak into the next frame
        let frames = decoder.push(b"data: x\n\n");
        assert_eq!(frames[0].event, "message");
    }

    #[test]
    fn test_decode_multibyte_split() {
        let mut decoder = SseDecoder::new();
        let text = "event: weather\ndata: Köln\n\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(decoder.push(&text[..split]).is_empty());
        let frames = decoder.push(&text[split..]);
        assert_eq!(frames[0].data, "Köln");
    }

    #[test]
    fn test_sse_channel_url() {
        let channel = SseChannel::new("http://localhost:8080/").unwrap();
        assert_eq!(channel.url(), "http://localhost:8080/api/events");
    }
}
