// In-process room hub backing the WebSocket endpoint

use super::{EventChannel, RoomEvent};
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// Broadcasts every event to every connected socket; each socket keeps
/// only the rooms it has joined.
#[derive(Clone)]
pub struct RoomHub {
    sender: broadcast::Sender<RoomEvent>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> RoomSubscription {
        RoomSubscription {
            receiver: self.sender.subscribe(),
            rooms: HashSet::new(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventChannel for RoomHub {
    async fn publish(&self, event: RoomEvent) -> Result<()> {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// One socket's view of the hub
pub struct RoomSubscription {
    receiver: broadcast::Receiver<RoomEvent>,
    rooms: HashSet<String>,
}

impl RoomSubscription {
    pub fn join(&mut self, room: impl Into<String>) -> bool {
        self.rooms.insert(room.into())
    }

    pub fn is_member(&self, room: &str) -> bool {
        self.rooms.contains(room)
    }

    /// Next event for a joined room, or `None` once the hub is gone.
    /// Events missed while lagging are skipped.
    pub async fn next(&mut self) -> Option<RoomEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.rooms.contains(&event.room) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Room subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::rooms;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_subscriber_only_sees_joined_rooms() {
        let hub = RoomHub::new();
        let resident = Uuid::new_v4();
        let mut sub = hub.subscribe();
        sub.join(rooms::resident(resident));

        hub.publish(RoomEvent::to_security("guest-arrived", json!({"n": 1})))
            .await
            .unwrap();
        hub.publish(RoomEvent::to_resident(resident, "guest-arrived", json!({"n": 2})))
            .await
            .unwrap();

        let event = sub.next().await.unwrap();
        assert_eq!(event.payload["n"], 2);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let hub = RoomHub::new();
        assert_eq!(hub.subscriber_count(), 0);
        assert!(hub
            .publish(RoomEvent::to_security("x", json!({})))
            .await
            .is_ok());
    }
}
