// Out-of-band event push to subscribed clients
//
// Persistence always happens first; pushing is best-effort and never fails
// the operation that produced the event.

pub mod fanout;
pub mod hub;
pub mod redis;

pub use fanout::FanOut;
pub use hub::RoomHub;
pub use redis::RedisEventChannel;

use crate::errors::Result;
use crate::observability::MetricsRecorder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Room names
pub mod rooms {
    use uuid::Uuid;

    pub const SECURITY: &str = "security-room";

    pub fn resident(resident_id: Uuid) -> String {
        format!("resident-{}", resident_id)
    }

    pub fn user(user_id: Uuid) -> String {
        format!("user-{}", user_id)
    }
}

/// Event names
pub mod events {
    pub const GUEST_ARRIVED: &str = "guest-arrived";
    pub const GUEST_DEPARTED: &str = "guest-departed";
    pub const DELIVERY_SCHEDULED: &str = "delivery-scheduled";
    pub const DELIVERY_COMPLETED: &str = "delivery-completed";
    pub const NOTIFICATION: &str = "notification";
}

/// One server-to-client frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub room: String,
    pub event: String,
    pub payload: Value,
}

impl RoomEvent {
    pub fn new(room: impl Into<String>, event: &str, payload: Value) -> Self {
        Self {
            room: room.into(),
            event: event.to_string(),
            payload,
        }
    }

    pub fn to_resident(resident_id: Uuid, event: &str, payload: Value) -> Self {
        Self::new(rooms::resident(resident_id), event, payload)
    }

    pub fn to_security(event: &str, payload: Value) -> Self {
        Self::new(rooms::SECURITY, event, payload)
    }

    pub fn to_user(user_id: Uuid, event: &str, payload: Value) -> Self {
        Self::new(rooms::user(user_id), event, payload)
    }
}

/// A transport that can deliver room events
#[async_trait]
pub trait EventChannel: Send + Sync {
    async fn publish(&self, event: RoomEvent) -> Result<()>;
}

/// Publish and swallow any failure, logging it. Returns whether it was delivered.
pub async fn push(channel: &dyn EventChannel, event: RoomEvent) -> bool {
    let room = event.room.clone();
    let name = event.event.clone();
    match channel.publish(event).await {
        Ok(()) => {
            MetricsRecorder::record_push(&name, true);
            true
        }
        Err(e) => {
            tracing::warn!(room = %room, event = %name, "Event push failed: {}", e);
            MetricsRecorder::record_push(&name, false);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use serde_json::json;

    struct Broken;

    #[async_trait]
    impl EventChannel for Broken {
        async fn publish(&self, _event: RoomEvent) -> Result<()> {
            Err(AppError::Internal("transport down".to_string()))
        }
    }

    #[test]
    fn test_room_names() {
        let id = Uuid::nil();
        assert_eq!(
            rooms::resident(id),
            "resident-00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(RoomEvent::to_security("x", json!({})).room, "security-room");
    }

    #[tokio::test]
    async fn test_push_swallows_failures() {
        let delivered = push(&Broken, RoomEvent::to_security(events::GUEST_ARRIVED, json!({}))).await;
        assert!(!delivered);
    }
}
