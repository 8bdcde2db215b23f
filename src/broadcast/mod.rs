//! Per-board publish/subscribe fan-out
//!
//! One topic per board; the subscriber set is exactly the connections that
//! have joined and not yet left or disconnected. Delivery is fire-and-forget
//! into each subscriber's outbox - no acknowledgement, no retry.

use crate::protocol::ServerMessage;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Default)]
pub struct Broadcaster {
    /// board id -> (connection id -> outbox)
    topics: Mutex<HashMap<Uuid, HashMap<Uuid, mpsc::Sender<ServerMessage>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, HashMap<Uuid, mpsc::Sender<ServerMessage>>>> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self, board_id: Uuid, connection_id: Uuid, outbox: mpsc::Sender<ServerMessage>) {
        self.lock()
            .entry(board_id)
            .or_default()
            .insert(connection_id, outbox);
    }

    /// Remove a subscriber; true iff it was present (idempotent teardown
    /// relies on this)
    pub fn unsubscribe(&self, board_id: Uuid, connection_id: Uuid) -> bool {
        let mut topics = self.lock();
        let Some(subscribers) = topics.get_mut(&board_id) else {
            return false;
        };
        let removed = subscribers.remove(&connection_id).is_some();
        if subscribers.is_empty() {
            topics.remove(&board_id);
        }
        removed
    }

    pub fn subscriber_count(&self, board_id: Uuid) -> usize {
        self.lock().get(&board_id).map_or(0, HashMap::len)
    }

    /// Deliver to every subscriber of the board, the originator included
    pub async fn publish_all(&self, board_id: Uuid, message: ServerMessage) {
        self.publish(board_id, None, message).await;
    }

    /// Deliver to every subscriber except the originator (presence events:
    /// the originator already has that state locally)
    pub async fn publish_others(&self, board_id: Uuid, origin: Uuid, message: ServerMessage) {
        self.publish(board_id, Some(origin), message).await;
    }

    async fn publish(&self, board_id: Uuid, skip: Option<Uuid>, message: ServerMessage) {
        // Snapshot the outboxes so the lock never spans an await
        let outboxes: Vec<(Uuid, mpsc::Sender<ServerMessage>)> = {
            let topics = self.lock();
            match topics.get(&board_id) {
                Some(subscribers) => subscribers
                    .iter()
                    .filter(|(id, _)| Some(**id) != skip)
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect(),
                None => return,
            }
        };
        for (connection_id, outbox) in outboxes {
            if outbox.send(message.clone()).await.is_err() {
                tracing::warn!(%connection_id, "Dropping broadcast to closed outbox");
            }
        }
    }
}
