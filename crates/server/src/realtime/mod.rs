//! Live-update relay.
//!
//! Each [`Room`] has a `tokio::sync::broadcast` channel, created on first
//! subscribe. Handlers publish [`QueueEvent`]s after committing a change and
//! the WebSocket layer ([`ws`]) forwards them to subscribed sockets.
//!
//! ```text
//!  REST handler ──publish──> RoomHub ──broadcast──> queue:7      ──> customer screens
//!                                    ├─broadcast──> ticket:<tok> ──> one customer
//!                                    └─broadcast──> merchant:3   ──> dashboards
//! ```
//!
//! There is no replay: a receiver that falls more than the channel capacity
//! behind skips the missed events.

pub mod ws;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use queuehub_core::{MerchantId, QueueEvent, Room};

/// Capacity of each room's broadcast channel.
pub const ROOM_CHANNEL_CAPACITY: usize = 256;

/// Relay statistics.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HubStats {
    pub rooms: usize,
    pub receivers: usize,
    pub events_published: u64,
    pub subscriptions: u64,
}

/// Registry of per-room broadcast channels.
pub struct RoomHub {
    capacity: usize,
    rooms: RwLock<HashMap<Room, broadcast::Sender<QueueEvent>>>,
    events_published: AtomicU64,
    subscriptions: AtomicU64,
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new(ROOM_CHANNEL_CAPACITY)
    }
}

impl RoomHub {
    /// Create a hub whose rooms buffer `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rooms: RwLock::new(HashMap::new()),
            events_published: AtomicU64::new(0),
            subscriptions: AtomicU64::new(0),
        }
    }

    /// Subscribe to a room, creating its channel if needed.
    pub async fn subscribe(&self, room: Room) -> broadcast::Receiver<QueueEvent> {
        {
            let rooms = self.rooms.read().await;
            if let Some(sender) = rooms.get(&room) {
                self.subscriptions.fetch_add(1, Ordering::Relaxed);
                return sender.subscribe();
            }
        }

        let mut rooms = self.rooms.write().await;
        self.subscriptions.fetch_add(1, Ordering::Relaxed);

        // Another task may have created it while we waited for the write lock.
        if let Some(sender) = rooms.get(&room) {
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(self.capacity);
        rooms.insert(room, sender);
        debug!(room = %room, "Created relay room");
        receiver
    }

    /// Publish an event to one room. Returns the number of receivers reached.
    pub async fn publish(&self, room: Room, event: QueueEvent) -> usize {
        let rooms = self.rooms.read().await;
        let Some(sender) = rooms.get(&room) else {
            return 0;
        };

        match sender.send(event) {
            Ok(count) => {
                self.events_published.fetch_add(1, Ordering::Relaxed);
                count
            }
            // Every receiver has gone; the room is removed on the next cleanup.
            Err(_) => 0,
        }
    }

    /// Publish one event to several rooms. Returns the receivers reached.
    pub async fn publish_to(&self, rooms: &[Room], event: &QueueEvent) -> usize {
        let mut reached = 0;
        for room in rooms {
            reached += self.publish(*room, event.clone()).await;
        }
        debug!(
            rooms = rooms.len(),
            event_type = event.event_type(),
            reached,
            "Relayed event"
        );
        reached
    }

    /// Publish to the event's queue room and to the merchant's room.
    pub async fn publish_queue_event(&self, merchant_id: MerchantId, event: QueueEvent) -> usize {
        let rooms = [Room::Queue(event.queue_id()), Room::Merchant(merchant_id)];
        self.publish_to(&rooms, &event).await
    }

    /// Drop rooms nobody listens to. Returns how many were removed.
    pub async fn cleanup_empty_rooms(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|_, sender| sender.receiver_count() > 0);
        let removed = before - rooms.len();
        if removed > 0 {
            info!(removed, remaining = rooms.len(), "Cleaned up empty relay rooms");
        }
        removed
    }

    /// Current relay statistics.
    pub async fn stats(&self) -> HubStats {
        let rooms = self.rooms.read().await;
        HubStats {
            rooms: rooms.len(),
            receivers: rooms.values().map(broadcast::Sender::receiver_count).sum(),
            events_published: self.events_published.load(Ordering::Relaxed),
            subscriptions: self.subscriptions.load(Ordering::Relaxed),
        }
    }
}
