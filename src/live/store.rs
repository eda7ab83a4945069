//! Live State Store
//!
//! Owns the live widget state for one dashboard session. Each enabled feed
//! runs as its own task and writes only its own [`FeedView`]; readers get
//! snapshots through a `watch` channel.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::channel::EventChannel;
use super::feed::FeedRunner;
use super::machine::{FeedState, ReconnectPolicy};
use super::messages::{DockerContainer, DockerEvent, LiveEvent, SystemStats, WeatherData, WeatherEvent};
use crate::schema::{Feed, HerbstConfig};

/// Why a feed has no (fresh) data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FeedIssue {
    /// Misconfigured; the feed never connects
    Config(String),
    /// The backend reported a provider failure
    Upstream(String),
    /// The channel failed; a reconnect is pending
    Channel(String),
    /// The retry cap was reached; the feed stopped
    Exhausted(String),
}

/// Lifecycle metadata of one feed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub state: FeedState,
    pub issue: Option<FeedIssue>,
    /// Consecutive failed connection attempts
    pub attempts: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One feed's state plus its current data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedView<T> {
    #[serde(flatten)]
    pub status: FeedStatus,
    pub data: Option<T>,
}

impl<T> Default for FeedView<T> {
    fn default() -> Self {
        Self {
            status: FeedStatus::default(),
            data: None,
        }
    }
}

impl<T> FeedView<T> {
    pub fn state(&self) -> FeedState {
        self.status.state
    }
}

/// Everything the live widgets render
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub weather: FeedView<WeatherData>,
    /// Containers keyed by id
    pub docker: FeedView<BTreeMap<String, DockerContainer>>,
    pub system: FeedView<SystemStats>,
    /// The server announced a configuration change
    pub reload_requested: bool,
}

impl LiveSnapshot {
    pub fn status(&self, feed: Feed) -> &FeedStatus {
        match feed {
            Feed::Weather => &self.weather.status,
            Feed::Docker => &self.docker.status,
            Feed::System => &self.system.status,
        }
    }

    pub fn status_mut(&mut self, feed: Feed) -> &mut FeedStatus {
        match feed {
            Feed::Weather => &mut self.weather.status,
            Feed::Docker => &mut self.docker.status,
            Feed::System => &mut self.system.status,
        }
    }

    pub fn state(&self, feed: Feed) -> FeedState {
        self.status(feed).state
    }

    /// Containers ordered by name
    pub fn containers(&self) -> Vec<&DockerContainer> {
        let mut containers: Vec<&DockerContainer> = self
            .docker
            .data
            .as_ref()
            .map(|set| set.values().collect())
            .unwrap_or_default();
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        containers
    }

    /// Reduce one event into the snapshot
    pub fn apply(&mut self, event: LiveEvent, at: DateTime<Utc>) {
        match event {
            LiveEvent::Connected => {}
            LiveEvent::Reload => self.reload_requested = true,
            LiveEvent::Weather(WeatherEvent::Reading(data)) => {
                self.weather.data = Some(data);
                self.weather.status.issue = None;
                self.weather.status.updated_at = Some(at);
            }
            LiveEvent::Weather(WeatherEvent::Failed { error }) => {
                self.weather.data = None;
                self.weather.status.issue = Some(FeedIssue::Upstream(error));
                self.weather.status.updated_at = Some(at);
            }
            LiveEvent::Docker(DockerEvent::Snapshot { containers }) => {
                self.docker.data = Some(
                    containers
                        .into_iter()
                        .map(|c| (c.id.clone(), c))
                        .collect(),
                );
                self.docker.status.updated_at = Some(at);
            }
            LiveEvent::Docker(DockerEvent::Delta { upserted, removed }) => {
                let set = self.docker.data.get_or_insert_with(BTreeMap::new);
                for container in upserted {
                    set.insert(container.id.clone(), container);
                }
                for id in &removed {
                    set.remove(id);
                }
                self.docker.status.updated_at = Some(at);
            }
            LiveEvent::System(stats) => {
                self.system.data = Some(stats);
                self.system.status.updated_at = Some(at);
            }
        }
    }
}

/// Live state for one dashboard session
pub struct LiveStateStore {
    state: Arc<watch::Sender<LiveSnapshot>>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<(Feed, JoinHandle<()>)>,
}

impl LiveStateStore {
    /// Spawn one task per enabled feed
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(
        config: &HerbstConfig,
        channel: Arc<dyn EventChannel>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state, _) = watch::channel(LiveSnapshot::default());
        let state = Arc::new(state);
        let (shutdown, _) = watch::channel(false);

        let mut tasks = Vec::new();
        for feed in Feed::ALL {
            if !config.feed_enabled(feed) {
                tracing::debug!(feed = %feed, "Feed disabled");
                continue;
            }

            if feed == Feed::Weather {
                if let Err(e) = config.weather.target() {
                    tracing::warn!(feed = %feed, error = %e, "Weather feed not started");
                    state.send_modify(|snapshot| {
                        snapshot.weather.status.issue = Some(FeedIssue::Config(e.hint().to_string()));
                    });
                    continue;
                }
            }

            let runner = FeedRunner::new(
                feed,
                Arc::clone(&channel),
                policy.clone(),
                Arc::clone(&state),
                shutdown.subscribe(),
            );
            tasks.push((feed, tokio::spawn(runner.run())));
        }

        tracing::info!(feeds = tasks.len(), "Live state store started");

        Self {
            state,
            shutdown,
            tasks,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.state.borrow().clone()
    }

    /// Feeds that have a running task
    pub fn active_feeds(&self) -> Vec<Feed> {
        self.tasks.iter().map(|(feed, _)| *feed).collect()
    }

    /// Tear down every feed and wait for its task to finish
    ///
    /// Open channels are dropped and pending reconnect timers cancelled.
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);

        for (feed, handle) in std::mem::take(&mut self.tasks) {
            if let Err(e) = handle.await {
                tracing::warn!(feed = %feed, error = %e, "Feed task ended abnormally");
            }
        }

        tracing::info!("Live state store stopped");
    }
}

impl Drop for LiveStateStore {
    fn drop(&mut self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::channel::{ChannelError, EventStream};
    use crate::live::messages::RawEvent;
    use crate::schema::validate;
    use async_trait::async_trait;
    use futures_util::stream::{self, StreamExt};
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    enum Script {
        Refuse,
        /// Deliver frames, then close
        Close(Vec<RawEvent>),
        /// Deliver frames, then stay open
        Hold(Vec<RawEvent>),
    }

    #[derive(Default)]
    struct ScriptedChannel {
        scripts: Mutex<HashMap<Feed, VecDeque<Script>>>,
        opens: Mutex<HashMap<Feed, usize>>,
    }

    impl ScriptedChannel {
        fn script(self, feed: Feed, steps: Vec<Script>) -> Self {
            self.scripts.lock().unwrap().insert(feed, steps.into());
            self
        }

        fn opens(&self, feed: Feed) -> usize {
            self.opens.lock().unwrap().get(&feed).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl EventChannel for ScriptedChannel {
        async fn open(&self, feed: Feed) -> Result<EventStream, ChannelError> {
            *self.opens.lock().unwrap().entry(feed).or_default() += 1;
            let step = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&feed)
                .and_then(|steps| steps.pop_front())
                .unwrap_or(Script::Hold(Vec::new()));

            match step {
                Script::Refuse => Err(ChannelError::Connect("connection refused".to_string())),
                Script::Close(frames) => Ok(stream::iter(frames.into_iter().map(Ok)).boxed()),
                Script::Hold(frames) => Ok(stream::iter(frames.into_iter().map(Ok))
                    .chain(stream::pending())
                    .boxed()),
            }
        }
    }

    fn config(weather: serde_json::Value, docker: bool, system: bool) -> HerbstConfig {
        validate(&json!({
            "title": "t",
            "theme": "default",
            "services": [],
            "weather": weather,
            "docker": {"enabled": docker},
            "system": {"enabled": system}
        }))
        .unwrap()
    }

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            multiplier: 2,
            max_attempts: None,
        }
    }

    fn container(id: &str, name: &str) -> serde_json::Value {
        json!({"id": id, "name": name, "image": "nginx", "state": "running", "status": "Up", "created": 1700000000})
    }

    fn docker_frame(payload: serde_json::Value) -> RawEvent {
        RawEvent::new("docker", payload.to_string())
    }

    fn system_frame(cpu: f64) -> RawEvent {
        RawEvent::new("system", json!({"cpuPercent": cpu}).to_string())
    }

    #[test]
    fn test_apply_docker_snapshot_then_remove() {
        let mut snapshot = LiveSnapshot::default();
        let now = Utc::now();
        let full = LiveEvent::decode(&docker_frame(
            json!({"kind": "snapshot", "containers": [container("c1", "web")]}),
        ))
        .unwrap()
        .unwrap();
        let remove = LiveEvent::decode(&docker_frame(json!({"kind": "delta", "removed": ["c1"]})))
            .unwrap()
            .unwrap();

        snapshot.apply(full, now);
        assert_eq!(snapshot.containers().len(), 1);
        snapshot.apply(remove, now);
        assert_eq!(snapshot.docker.data, Some(BTreeMap::new()));
    }

    #[test]
    fn test_apply_docker_snapshot_replaces_and_delta_upserts() {
        let mut snapshot = LiveSnapshot::default();
        let now = Utc::now();
        for payload in [
            json!({"kind": "snapshot", "containers": [container("c1", "web"), container("c2", "db")]}),
            json!({"kind": "snapshot", "containers": [container("c3", "cache")]}),
            json!({"kind": "delta", "upserted": [container("c3", "cache-2"), container("c4", "api")]}),
        ] {
            let event = LiveEvent::decode(&docker_frame(payload)).unwrap().unwrap();
            snapshot.apply(event, now);
        }

        let names: Vec<&str> = snapshot.containers().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["api", "cache-2"]);
    }

    #[test]
    fn test_apply_weather_last_write_wins_and_failure_clears() {
        let mut snapshot = LiveSnapshot::default();
        let now = Utc::now();
        let reading = |city: &str| {
            LiveEvent::Weather(WeatherEvent::Reading(WeatherData {
                temp: 10.0,
                feels_like: 9.0,
                humidity: 50.0,
                description: "clear".to_string(),
                icon: "01d".to_string(),
                city: city.to_string(),
            }))
        };

        snapshot.apply(reading("Berlin"), now);
        snapshot.apply(reading("Hamburg"), now);
        assert_eq!(snapshot.weather.data.as_ref().map(|d| d.city.as_str()), Some("Hamburg"));

        snapshot.apply(
            LiveEvent::Weather(WeatherEvent::Failed {
                error: "rate limited".to_string(),
            }),
            now,
        );
        assert!(snapshot.weather.data.is_none());
        assert_eq!(
            snapshot.weather.status.issue,
            Some(FeedIssue::Upstream("rate limited".to_string()))
        );
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let mut snapshot = LiveSnapshot::default();
        snapshot.apply(LiveEvent::Reload, Utc::now());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["reloadRequested"], true);
        assert_eq!(value["weather"]["state"], "disconnected");
        assert!(value["docker"]["data"].is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn test_docker_feed_reconciles_stream() {
        let channel = Arc::new(ScriptedChannel::default().script(
            Feed::Docker,
            vec![Script::Hold(vec![
                RawEvent::new("connected", "ok"),
                docker_frame(json!({"kind": "snapshot", "containers": [container("c1", "web")]})),
                docker_frame(json!({"kind": "delta", "removed": ["c1"]})),
            ])],
        ));
        let store = LiveStateStore::start(&config(json!(null), true, false), channel.clone(), policy());
        let mut rx = store.subscribe();

        let snapshot = rx
            .wait_for(|s| s.docker.data.as_ref().is_some_and(|m| m.is_empty()))
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.state(Feed::Docker), FeedState::Streaming);
        assert_eq!(channel.opens(Feed::Docker), 1);

        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_weather_without_target_never_connects() {
        let channel = Arc::new(ScriptedChannel::default());
        let weather = json!({"enabled": true, "apiKey": "k", "location": ""});
        let config = config(weather, false, false);
        assert!(config.weather.target().is_err());

        let store = LiveStateStore::start(&config, channel.clone(), policy());
        tokio::time::sleep(Duration::from_secs(5)).await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.state(Feed::Weather), FeedState::Disconnected);
        assert!(matches!(
            snapshot.weather.status.issue,
            Some(FeedIssue::Config(_))
        ));
        assert!(snapshot.weather.data.is_none());
        assert_eq!(channel.opens(Feed::Weather), 0);
        assert!(store.active_feeds().is_empty());

        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_feeds_stay_disconnected() {
        let channel = Arc::new(ScriptedChannel::default().script(
            Feed::System,
            vec![Script::Hold(vec![system_frame(5.0)])],
        ));
        let store = LiveStateStore::start(&config(json!(null), false, true), channel.clone(), policy());
        let mut rx = store.subscribe();

        rx.wait_for(|s| s.system.data.is_some()).await.unwrap();
        let snapshot = store.snapshot();
        assert_eq!(store.active_feeds(), vec![Feed::System]);
        assert_eq!(snapshot.state(Feed::Docker), FeedState::Disconnected);
        assert!(snapshot.docker.data.is_none());
        assert_eq!(channel.opens(Feed::Docker), 0);
        assert_eq!(channel.opens(Feed::Weather), 0);

        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_backs_off_then_resets() {
        let channel = Arc::new(ScriptedChannel::default().script(
            Feed::System,
            vec![
                Script::Refuse,
                Script::Refuse,
                Script::Refuse,
                Script::Close(vec![system_frame(1.0)]),
                Script::Hold(vec![system_frame(2.0)]),
            ],
        ));
        let started = tokio::time::Instant::now();
        let store = LiveStateStore::start(&config(json!(null), false, true), channel.clone(), policy());
        let mut rx = store.subscribe();

        rx.wait_for(|s| s.system.data.as_ref().is_some_and(|d| d.cpu_percent == 2.0))
            .await
            .unwrap();

        // 100 + 200 + 400 before the first stream, then 100 after the reset
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(800) && elapsed < Duration::from_millis(900));
        assert_eq!(channel.opens(Feed::System), 5);
        let status = store.snapshot().system.status;
        assert_eq!(status.state, FeedState::Streaming);
        assert_eq!(status.attempts, 0);
        assert!(status.issue.is_none());

        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_cap_ends_disconnected() {
        let channel = Arc::new(ScriptedChannel::default().script(
            Feed::System,
            vec![Script::Refuse, Script::Refuse, Script::Refuse, Script::Refuse],
        ));
        let capped = ReconnectPolicy {
            max_attempts: Some(2),
            ..policy()
        };
        let store = LiveStateStore::start(&config(json!(null), false, true), channel.clone(), capped);
        let mut rx = store.subscribe();

        let snapshot = rx
            .wait_for(|s| matches!(s.system.status.issue, Some(FeedIssue::Exhausted(_))))
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.state(Feed::System), FeedState::Disconnected);
        assert_eq!(channel.opens(Feed::System), 3);

        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_reconnect() {
        let channel = Arc::new(ScriptedChannel::default().script(Feed::Docker, vec![Script::Refuse]));
        let slow = ReconnectPolicy {
            initial_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(3600),
            ..policy()
        };
        let store = LiveStateStore::start(&config(json!(null), true, false), channel.clone(), slow);
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.state(Feed::Docker) == FeedState::Reconnecting)
            .await
            .unwrap();

        store.shutdown().await;

        assert_eq!(channel.opens(Feed::Docker), 1);
        assert_eq!(rx.borrow().state(Feed::Docker), FeedState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_events_ignored_and_reload_flagged() {
        let channel = Arc::new(ScriptedChannel::default().script(
            Feed::System,
            vec![Script::Hold(vec![
                RawEvent::new("system", "not json"),
                RawEvent::new("docker", json!({"kind": "snapshot", "containers": []}).to_string()),
                system_frame(3.0),
                RawEvent::new("reload", "reload"),
            ])],
        ));
        let store = LiveStateStore::start(&config(json!(null), false, true), channel.clone(), policy());
        let mut rx = store.subscribe();

        let snapshot = rx.wait_for(|s| s.reload_requested).await.unwrap().clone();
        assert_eq!(snapshot.system.data.map(|d| d.cpu_percent), Some(3.0));
        // docker frames on the system stream are not this feed's business
        assert!(snapshot.docker.data.is_none());

        store.shutdown().await;
    }
}
