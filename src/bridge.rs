//! Event Bridge: fans device events out to WebSocket subscribers grouped
//! by camera room. Grounded in the `_broadcast_to_socketio` /
//! `emit_to_requested_sids` call sites in
//! `original_source/tcp/tcp_client.py` (broadcast keyed by `camera_id`)
//! and the camera/device many-to-many in `crud/camera.py` that decides
//! room membership. A slow subscriber never blocks the device's read
//! loop: each subscriber gets a bounded outbox, and events are dropped
//! for a subscriber whose outbox stays full rather than back-pressuring
//! the broadcaster. A subscriber that stays full for
//! `SUBSCRIBER_OVERFLOW_LIMIT` consecutive events in a row is judged
//! stalled and dropped from the room outright, so its backlog stops
//! growing and it stops costing the room anything.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

const SUBSCRIBER_OUTBOX_CAPACITY: usize = 64;
const SUBSCRIBER_OVERFLOW_LIMIT: u32 = 8;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Arc<Value>>,
    overflow_streak: AtomicU32,
}

#[derive(Default)]
pub struct RoomIndex {
    rooms: RwLock<HashMap<i64, Vec<Subscriber>>>,
}

pub type SubscriberId = u64;

pub struct Bridge {
    rooms: RoomIndex,
    next_id: AtomicU64,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        Self {
            rooms: RoomIndex::default(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Joins `camera_id`'s room, returning a subscriber id (for
    /// `unsubscribe`) and the receiving half of its bounded outbox.
    pub async fn subscribe(&self, camera_id: i64) -> (SubscriberId, mpsc::Receiver<Arc<Value>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_OUTBOX_CAPACITY);
        let mut rooms = self.rooms.rooms.write().await;
        rooms.entry(camera_id).or_default().push(Subscriber {
            id,
            tx,
            overflow_streak: AtomicU32::new(0),
        });
        (id, rx)
    }

    pub async fn unsubscribe(&self, camera_id: i64, subscriber_id: SubscriberId) {
        let mut rooms = self.rooms.rooms.write().await;
        if let Some(subs) = rooms.get_mut(&camera_id) {
            subs.retain(|s| s.id != subscriber_id);
            if subs.is_empty() {
                rooms.remove(&camera_id);
            }
        }
    }

    /// Broadcasts `event` to every subscriber of `camera_id`'s room.
    /// Subscribers whose channel is closed are pruned. A subscriber
    /// whose outbox is full for this event is skipped (the event is
    /// dropped for them, not queued); once that happens
    /// `SUBSCRIBER_OVERFLOW_LIMIT` times in a row the subscriber is
    /// judged stalled and dropped from the room, closing its outbox so
    /// its backlog stops accumulating.
    pub async fn broadcast(&self, camera_id: i64, event: Value) {
        let event = Arc::new(event);
        let mut rooms = self.rooms.rooms.write().await;
        let Some(subs) = rooms.get_mut(&camera_id) else {
            return;
        };

        subs.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => {
                sub.overflow_streak.store(0, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let streak = sub.overflow_streak.fetch_add(1, Ordering::Relaxed) + 1;
                if streak >= SUBSCRIBER_OVERFLOW_LIMIT {
                    tracing::warn!(
                        camera_id,
                        subscriber_id = sub.id,
                        streak,
                        "subscriber outbox stalled, dropping subscriber"
                    );
                    false
                } else {
                    true
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        if subs.is_empty() {
            rooms.remove(&camera_id);
        }
    }

    pub async fn subscriber_count(&self, camera_id: i64) -> usize {
        self.rooms
            .rooms
            .read()
            .await
            .get(&camera_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn broadcast_reaches_only_the_named_room() {
        let bridge = Bridge::new();
        let (_id_a, mut rx_a) = bridge.subscribe(1).await;
        let (_id_b, mut rx_b) = bridge.subscribe(2).await;

        bridge.broadcast(1, json!({"messageType": "live"})).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_removes_the_empty_room() {
        let bridge = Bridge::new();
        let (id, _rx) = bridge.subscribe(5).await;
        assert_eq!(bridge.subscriber_count(5).await, 1);

        bridge.unsubscribe(5, id).await;
        assert_eq!(bridge.subscriber_count(5).await, 0);
    }

    #[tokio::test]
    async fn full_outbox_drops_events_without_blocking_other_subscribers() {
        let bridge = Bridge::new();
        let (_id, mut rx) = bridge.subscribe(1).await;

        for _ in 0..SUBSCRIBER_OUTBOX_CAPACITY + 3 {
            bridge.broadcast(1, json!({"n": 1})).await;
        }

        let mut drained = 0;
        while rx.try_recv().is_ok() {
            drained += 1;
        }
        assert_eq!(drained, SUBSCRIBER_OUTBOX_CAPACITY);
    }

    #[tokio::test]
    async fn stalled_subscriber_is_dropped_after_bounded_overflow() {
        let bridge = Bridge::new();
        let (_id, mut rx) = bridge.subscribe(1).await;
        assert_eq!(bridge.subscriber_count(1).await, 1);

        for _ in 0..(SUBSCRIBER_OUTBOX_CAPACITY + SUBSCRIBER_OVERFLOW_LIMIT as usize + 1) {
            bridge.broadcast(1, json!({"n": 1})).await;
        }

        assert_eq!(bridge.subscriber_count(1).await, 0);

        let mut drained = 0;
        while rx.try_recv().is_ok() {
            drained += 1;
        }
        assert_eq!(drained, SUBSCRIBER_OUTBOX_CAPACITY);
    }

    #[tokio::test]
    async fn a_stalled_subscriber_does_not_block_delivery_to_others() {
        let bridge = Bridge::new();
        let (_stalled_id, _stalled_rx) = bridge.subscribe(1).await;
        let (_id, mut rx) = bridge.subscribe(1).await;

        for _ in 0..(SUBSCRIBER_OUTBOX_CAPACITY + SUBSCRIBER_OVERFLOW_LIMIT as usize + 1) {
            bridge.broadcast(1, json!({"n": 1})).await;
            rx.try_recv().ok();
        }

        assert_eq!(bridge.subscriber_count(1).await, 1);
    }

    #[tokio::test]
    async fn dropped_receiver_prunes_subscriber_on_next_broadcast() {
        let bridge = Bridge::new();
        let (_id, rx) = bridge.subscribe(7).await;
        drop(rx);

        bridge.broadcast(7, json!({"n": 1})).await;
        assert_eq!(bridge.subscriber_count(7).await, 0);
    }
}
