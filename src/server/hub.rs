//! Event Hub
//!
//! Fans live events out to every `/api/events` subscriber over a tokio
//! broadcast channel. The newest event per feed is kept so a fresh
//! subscriber starts from current state instead of waiting for the next
//! publish. Docker deltas are folded into the kept snapshot.

use std::collections::BTreeMap;
use tokio::sync::{broadcast, RwLock};

use crate::live::{DockerContainer, DockerEvent, LiveEvent};
use crate::schema::Feed;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the broadcast channel; slower subscribers skip ahead
    pub broadcast_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 256,
        }
    }
}

pub struct EventHub {
    tx: broadcast::Sender<LiveEvent>,
    latest: RwLock<BTreeMap<Feed, LiveEvent>>,
}

impl EventHub {
    pub fn new(config: HubConfig) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            tx,
            latest: RwLock::new(BTreeMap::new()),
        }
    }

    /// Publish to every subscriber; returns how many received it
    pub async fn publish(&self, event: LiveEvent) -> usize {
        if let Some(feed) = event.feed() {
            let mut latest = self.latest.write().await;
            // docker is always kept as a full snapshot, seeded empty when
            // only deltas have been published so far
            let kept = match (latest.remove(&feed), &event) {
                (previous, LiveEvent::Docker(DockerEvent::Delta { upserted, removed })) => {
                    let containers = match previous {
                        Some(LiveEvent::Docker(DockerEvent::Snapshot { containers })) => containers,
                        _ => Vec::new(),
                    };
                    LiveEvent::Docker(DockerEvent::Snapshot {
                        containers: fold_delta(containers, upserted, removed),
                    })
                }
                _ => event.clone(),
            };
            latest.insert(feed, kept);
        }

        let delivered = self.tx.send(event.clone()).unwrap_or(0);
        tracing::trace!(event = %event.name(), subscribers = delivered, "Published event");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    /// Newest state per feed, optionally for one feed only
    pub async fn replay(&self, feed: Option<Feed>) -> Vec<LiveEvent> {
        self.latest
            .read()
            .await
            .iter()
            .filter(|(kind, _)| feed.map_or(true, |f| f == **kind))
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

fn fold_delta(
    containers: Vec<DockerContainer>,
    upserted: &[DockerContainer],
    removed: &[String],
) -> Vec<DockerContainer> {
    let mut set: BTreeMap<String, DockerContainer> =
        containers.into_iter().map(|c| (c.id.clone(), c)).collect();
    for container in upserted {
        set.insert(container.id.clone(), container.clone());
    }
    for id in removed {
        set.remove(id);
    }
    set.into_values().collect()
}
