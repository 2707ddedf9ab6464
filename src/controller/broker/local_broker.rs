use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use super::UpdateBroker;
use super::UpdateStream;
use crate::Result;

const DEFAULT_CAPACITY: usize = 64;

/// In-process broker.
///
/// Clones share one channel, so several controllers built in the same
/// process (tests, embedded setups) see each other's updates.
#[derive(Debug, Clone)]
pub struct LocalBroker {
    tx: broadcast::Sender<()>,
}

impl LocalBroker {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl UpdateBroker for LocalBroker {
    async fn publish(&self) -> Result<()> {
        match self.tx.send(()) {
            Ok(receivers) => debug!(receivers, "update published"),
            Err(_) => debug!("update published with no subscriber"),
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<UpdateStream> {
        let stream = BroadcastStream::new(self.tx.subscribe()).map(|item| match item {
            Ok(()) => Ok(()),
            // missed signals collapse into one: receivers re-read the store anyway
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!(skipped, "update subscription lagged");
                Ok(())
            }
        });
        Ok(stream.boxed())
    }
}
