//! Feed Runner
//!
//! One task per enabled feed. Drives the [`FeedMachine`] from channel
//! outcomes, applies decoded events to the shared snapshot, and sleeps out
//! reconnect delays. Every suspension point also listens for shutdown.

use chrono::Utc;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;

use super::channel::{ChannelError, EventChannel};
use super::machine::{FeedMachine, FeedState, ReconnectPolicy, Retry};
use super::messages::{LiveEvent, RawEvent};
use super::store::{FeedIssue, FeedStatus, LiveSnapshot};
use crate::schema::Feed;

enum Session {
    Shutdown,
    Failed(ChannelError),
}

pub(crate) struct FeedRunner {
    feed: Feed,
    channel: Arc<dyn EventChannel>,
    machine: FeedMachine,
    state: Arc<watch::Sender<LiveSnapshot>>,
    shutdown: watch::Receiver<bool>,
}

impl FeedRunner {
    pub(crate) fn new(
        feed: Feed,
        channel: Arc<dyn EventChannel>,
        policy: ReconnectPolicy,
        state: Arc<watch::Sender<LiveSnapshot>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            feed,
            channel,
            machine: FeedMachine::new(policy),
            state,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        if let Err(e) = self.machine.begin() {
            tracing::error!(feed = %self.feed, error = %e, "Feed could not start");
            return;
        }
        self.update(|status| status.state = FeedState::Connecting);
        tracing::debug!(feed = %self.feed, "Feed connecting");

        loop {
            let failure = match self.session().await {
                Session::Shutdown => break,
                Session::Failed(err) => err,
            };

            match self.machine.on_failure() {
                Retry::After(delay) => {
                    let attempts = self.machine.attempts();
                    tracing::warn!(
                        feed = %self.feed,
                        error = %failure,
                        delay_ms = delay.as_millis() as u64,
                        attempt = attempts,
                        "Feed channel failed, reconnecting"
                    );
                    self.update(|status| {
                        status.state = FeedState::Reconnecting;
                        status.attempts = attempts;
                        status.issue = Some(FeedIssue::Channel(failure.to_string()));
                    });

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = wait_for_shutdown(&mut self.shutdown) => break,
                    }

                    if self.machine.retry().is_err() {
                        break;
                    }
                    self.update(|status| status.state = FeedState::Connecting);
                }
                Retry::Exhausted => {
                    tracing::error!(
                        feed = %self.feed,
                        error = %failure,
                        "Feed gave up reconnecting"
                    );
                    self.update(|status| {
                        status.state = FeedState::Disconnected;
                        status.issue = Some(FeedIssue::Exhausted(failure.to_string()));
                    });
                    return;
                }
            }
        }

        self.machine.teardown();
        self.update(|status| status.state = FeedState::Disconnected);
        tracing::debug!(feed = %self.feed, "Feed torn down");
    }

    /// One channel lifetime: open, then read until failure or shutdown
    async fn session(&mut self) -> Session {
        let opened = tokio::select! {
            _ = wait_for_shutdown(&mut self.shutdown) => return Session::Shutdown,
            opened = self.channel.open(self.feed) => opened,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return Session::Failed(e),
        };

        loop {
            let item = tokio::select! {
                _ = wait_for_shutdown(&mut self.shutdown) => return Session::Shutdown,
                item = stream.next() => item,
            };

            match item {
                Some(Ok(raw)) => self.handle(raw),
                Some(Err(e)) => return Session::Failed(e),
                None => return Session::Failed(ChannelError::Closed),
            }
        }
    }

    fn handle(&mut self, raw: RawEvent) {
        let event = match LiveEvent::decode(&raw) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::trace!(feed = %self.feed, event = %raw.event, "Ignoring unknown event");
                return;
            }
            Err(e) => {
                tracing::warn!(feed = %self.feed, error = %e, "Dropping invalid event");
                return;
            }
        };

        if event.feed().is_some_and(|owner| owner != self.feed) {
            return;
        }

        if self.machine.on_event() {
            tracing::info!(feed = %self.feed, "Feed streaming");
            self.update(|status| {
                status.state = FeedState::Streaming;
                status.attempts = 0;
                status.issue = None;
            });
        }

        let now = Utc::now();
        self.state.send_modify(|snapshot| snapshot.apply(event, now));
    }

    fn update(&self, change: impl FnOnce(&mut FeedStatus)) {
        let feed = self.feed;
        self.state
            .send_modify(|snapshot| change(snapshot.status_mut(feed)));
    }
}

/// Resolves once shutdown was requested or the store went away
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
