use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::LongPollNotifier;
use super::UpdateBroker;
use super::UpdateStream;
use crate::metrics::BROKER_EVENTS;
use crate::utils::backoff::sleep_or_cancelled;

/// Long-lived task turning broker messages into local fan-outs.
///
/// It holds one subscription for the whole process lifetime. When the
/// subscription fails or ends it waits `resubscribe_delay` and subscribes
/// again, forever; only the shutdown token stops it.
pub struct BrokerBridge {
    broker: Arc<dyn UpdateBroker>,
    notifier: Arc<LongPollNotifier>,
    resubscribe_delay: Duration,
    shutdown: CancellationToken,
}

impl BrokerBridge {
    pub fn new(
        broker: Arc<dyn UpdateBroker>,
        notifier: Arc<LongPollNotifier>,
        resubscribe_delay: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            broker,
            notifier,
            resubscribe_delay,
            shutdown,
        }
    }

    /// Subscribes once before returning, so updates published after
    /// `start` resolves are never missed, then hands the loop to a
    /// background task.
    pub async fn start(self) -> JoinHandle<()> {
        let first = self.subscribe().await;
        tokio::spawn(async move { self.run(first).await })
    }

    async fn subscribe(&self) -> Option<UpdateStream> {
        match self.broker.subscribe().await {
            Ok(stream) => {
                info!("update broker subscription established");
                Some(stream)
            }
            Err(e) => {
                error!("update broker subscribe failed, retrying: {:?}", e);
                None
            }
        }
    }

    async fn run(
        self,
        mut subscription: Option<UpdateStream>,
    ) {
        loop {
            if let Some(stream) = subscription.take() {
                if !self.drain(stream).await {
                    break;
                }
            }

            BROKER_EVENTS.with_label_values(&["resubscribed"]).inc();
            if !sleep_or_cancelled(self.resubscribe_delay, &self.shutdown).await {
                break;
            }
            subscription = self.subscribe().await;
        }
        info!("update broker bridge stopped");
    }

    /// Forwards signals until the stream breaks. Returns `false` on shutdown.
    async fn drain(
        &self,
        mut stream: UpdateStream,
    ) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                item = stream.next() => match item {
                    Some(Ok(())) => {
                        BROKER_EVENTS.with_label_values(&["received"]).inc();
                        self.notifier.broadcast_local();
                    }
                    Some(Err(e)) => {
                        warn!("update broker subscription failed: {:?}", e);
                        return true;
                    }
                    None => {
                        warn!("update broker subscription lost, attempting to reconnect");
                        return true;
                    }
                }
            }
        }
    }
}
