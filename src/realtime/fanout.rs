use super::{EventChannel, RoomEvent};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

/// Publishes to several channels; succeeds if at least one accepts the event.
#[derive(Clone, Default)]
pub struct FanOut {
    channels: Vec<Arc<dyn EventChannel>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(mut self, channel: Arc<dyn EventChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl EventChannel for FanOut {
    async fn publish(&self, event: RoomEvent) -> Result<()> {
        if self.channels.is_empty() {
            return Ok(());
        }

        let mut failures = 0;
        for (idx, channel) in self.channels.iter().enumerate() {
            if let Err(e) = channel.publish(event.clone()).await {
                error!("Channel {} failed to publish {}: {:?}", idx, event.event, e);
                failures += 1;
            }
        }

        if failures == self.channels.len() {
            return Err(AppError::Internal(
                "All event channels failed to publish".to_string(),
            ));
        }

        Ok(())
    }
}
