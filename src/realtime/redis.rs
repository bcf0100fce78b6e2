// Redis pub/sub publisher, for consumers outside this process

use super::{EventChannel, RoomEvent};
use crate::{
    config::RedisConfig,
    errors::{AppError, Result},
};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

/// Create a Redis client and connection manager
pub async fn create_client(config: &RedisConfig) -> Result<ConnectionManager> {
    tracing::info!("Creating Redis client");

    let client = Client::open(config.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Redis client connected");

    Ok(manager)
}

/// Health check for Redis connection
pub async fn health_check(manager: &mut ConnectionManager) -> Result<()> {
    let _: String = redis::cmd("PING").query_async(manager).await?;
    Ok(())
}

/// Publishes each event as JSON on `<prefix>:<room>`.
#[derive(Clone)]
pub struct RedisEventChannel {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisEventChannel {
    pub fn new(manager: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            manager,
            prefix: prefix.into(),
        }
    }

    pub fn channel_for(&self, room: &str) -> String {
        format!("{}:{}", self.prefix, room)
    }

    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl EventChannel for RedisEventChannel {
    async fn publish(&self, event: RoomEvent) -> Result<()> {
        let channel = self.channel_for(&event.room);
        let body = serde_json::to_string(&event)
            .map_err(|e| AppError::Internal(format!("Failed to encode event: {}", e)))?;

        let mut manager = self.manager.clone();
        let receivers: i64 = manager.publish(&channel, body).await?;
        tracing::debug!("Published {} on {} to {} receivers", event.event, channel, receivers);
        Ok(())
    }
}
