//! Feed Lifecycle
//!
//! A small explicit state machine per feed:
//!
//! ```text
//! Disconnected ──begin──▶ Connecting ──first valid event──▶ Streaming
//!                             ▲   │                            │
//!                        retry│   │failure             failure │
//!                             │   ▼                            │
//!                          Reconnecting ◀──────────────────────┘
//!
//! any ──teardown──▶ Disconnected (terminal)
//! ```
//!
//! Nothing here touches the network or the clock; the feed runner drives
//! the transitions and sleeps for the delays handed back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    #[default]
    Disconnected,
    Connecting,
    Streaming,
    Reconnecting,
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeedState::Disconnected => "disconnected",
            FeedState::Connecting => "connecting",
            FeedState::Streaming => "streaming",
            FeedState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// Reconnect timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Growth factor between consecutive retries
    pub multiplier: u32,
    /// Give up after this many consecutive failures (`None` retries forever)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2,
            max_attempts: None,
        }
    }
}

/// Exponential backoff with a cap
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Delay for the next retry; advances the attempt counter
    pub fn next_delay(&mut self) -> Duration {
        let factor = self.policy.multiplier.max(1).saturating_pow(self.attempts);
        let delay = self
            .policy
            .initial_delay
            .checked_mul(factor)
            .unwrap_or(self.policy.max_delay)
            .min(self.policy.max_delay);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Whether another retry is allowed
    pub fn exhausted(&self) -> bool {
        self.policy
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Consecutive failures since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// What to do after a channel failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    After(Duration),
    Exhausted,
}

/// A transition requested from a state that does not allow it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot {action} while {from}")]
pub struct InvalidTransition {
    pub from: FeedState,
    pub action: &'static str,
}

/// Lifecycle of one feed
#[derive(Debug, Clone)]
pub struct FeedMachine {
    state: FeedState,
    backoff: Backoff,
    closed: bool,
}

impl FeedMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: FeedState::Disconnected,
            backoff: Backoff::new(policy),
            closed: false,
        }
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    /// Consecutive failures since the last successful stream
    pub fn attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Disconnected → Connecting
    pub fn begin(&mut self) -> Result<(), InvalidTransition> {
        self.expect(FeedState::Disconnected, "begin")?;
        self.state = FeedState::Connecting;
        Ok(())
    }

    /// A valid event arrived; returns true when this moved the feed
    /// into Streaming
    pub fn on_event(&mut self) -> bool {
        match self.state {
            FeedState::Connecting => {
                self.state = FeedState::Streaming;
                self.backoff.reset();
                true
            }
            _ => false,
        }
    }

    /// The channel failed to open, errored, or closed
    pub fn on_failure(&mut self) -> Retry {
        if self.closed {
            return Retry::Exhausted;
        }
        if self.backoff.exhausted() {
            self.state = FeedState::Disconnected;
            self.closed = true;
            return Retry::Exhausted;
        }
        self.state = FeedState::Reconnecting;
        Retry::After(self.backoff.next_delay())
    }

    /// Reconnecting → Connecting, once the retry delay elapsed
    pub fn retry(&mut self) -> Result<(), InvalidTransition> {
        self.expect(FeedState::Reconnecting, "retry")?;
        self.state = FeedState::Connecting;
        Ok(())
    }

    /// Terminal teardown
    pub fn teardown(&mut self) {
        self.state = FeedState::Disconnected;
        self.closed = true;
    }

    fn expect(&self, wanted: FeedState, action: &'static str) -> Result<(), InvalidTransition> {
        if self.closed || self.state != wanted {
            return Err(InvalidTransition {
                from: self.state,
                action,
            });
        }
        Ok(())
    }
}
