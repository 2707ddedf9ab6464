use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::UpdateBroker;
use super::UpdateStream;
use crate::constants::BROKER_UPDATE_MESSAGE;
use crate::BrokerConfig;
use crate::BrokerError;
use crate::Result;

/// Redis pub/sub broker shared by every controller instance.
pub struct RedisBroker {
    client: redis::Client,
    channel: String,
}

impl RedisBroker {
    /// Parses the URL only; connections are opened per publish and per
    /// subscription.
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str()).map_err(|e| {
            error!("invalid redis url: {}", e);
            BrokerError::Redis(e)
        })?;
        Ok(Self {
            client,
            channel: config.channel.clone(),
        })
    }
}

#[async_trait]
impl UpdateBroker for RedisBroker {
    async fn publish(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let receivers: u64 = conn.publish(&self.channel, BROKER_UPDATE_MESSAGE).await?;
        debug!(channel = %self.channel, receivers, "update published");
        Ok(())
    }

    async fn subscribe(&self) -> Result<UpdateStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        info!(channel = %self.channel, "subscribed to redis channel");

        let stream = pubsub.into_on_message().map(|msg| {
            debug!(channel = msg.get_channel_name(), "update signal received");
            Ok(())
        });
        Ok(stream.boxed())
    }
}
