//! Event Routes
//!
//! - GET /api/events - Server-Sent Events stream, optionally `?feed=<kind>`
//! - POST /api/events/:kind - Publish a payload for one feed
//!
//! Every stream starts with a `connected` event followed by the newest
//! state of each requested feed. Control events are sent regardless of the
//! feed filter.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::live::LiveEvent;
use crate::schema::Feed;
use crate::server::dto::PublishResponse;
use crate::server::error::{ApiError, ApiResult};
use crate::server::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub feed: Option<String>,
}

/// GET /api/events
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let feed = match query.feed.as_deref() {
        None | Some("") => None,
        Some(name) => Some(
            Feed::parse(name).ok_or_else(|| ApiError::Validation(format!("Unknown feed '{}'", name)))?,
        ),
    };

    // subscribe before reading the replay so nothing published in between is lost
    let rx = state.hub.subscribe();
    let replay = state.hub.replay(feed).await;
    tracing::debug!(feed = ?feed, subscribers = state.hub.subscriber_count(), "Event stream opened");

    let hub = Arc::clone(&state.hub);
    let live = stream::unfold(
        (rx, hub, VecDeque::new()),
        move |(mut rx, hub, mut pending)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((event, (rx, hub, pending)));
                }
                match rx.recv().await {
                    Ok(event) => return Some((event, (rx, hub, pending))),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event subscriber lagged, resending current state");
                        pending.extend(hub.replay(feed).await);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        },
    );

    let events = stream::once(async { LiveEvent::Connected })
        .chain(stream::iter(replay))
        .chain(live)
        .filter(move |event| {
            let wanted = match (event.feed(), feed) {
                (Some(kind), Some(filter)) => kind == filter,
                _ => true,
            };
            futures_util::future::ready(wanted)
        })
        .filter_map(|event| async move { to_sse(&event).map(Ok) });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &LiveEvent) -> Option<Event> {
    match event.encode() {
        Ok(raw) => Some(Event::default().event(raw.event).data(raw.data)),
        Err(e) => {
            tracing::warn!(event = %event.name(), error = %e, "Failed to encode event");
            None
        }
    }
}

/// POST /api/events/:kind
pub async fn publish_event(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    body: String,
) -> ApiResult<(StatusCode, Json<PublishResponse>)> {
    let feed = Feed::parse(&kind).ok_or_else(|| ApiError::NotFound(format!("Unknown feed '{}'", kind)))?;
    let event = LiveEvent::from_payload(feed, &body).map_err(|e| ApiError::Validation(e.to_string()))?;

    let delivered = state.hub.publish(event).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse {
            event: feed.to_string(),
            delivered,
        }),
    ))
}
