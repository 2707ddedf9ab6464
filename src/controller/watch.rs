use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ConfigService;
use super::LongPollNotifier;
use crate::metrics::WATCH_OUTCOMES;
use crate::ConfigRevision;
use crate::Error;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    /// A revision newer than the caller's tag exists
    Changed(ConfigRevision),
    /// The timeout elapsed, or a wake turned out to carry nothing new
    NotModified,
    /// Shutdown interrupted the wait; nothing should be answered
    Cancelled,
}

impl WatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            WatchOutcome::Changed(_) => "changed",
            WatchOutcome::NotModified => "not_modified",
            WatchOutcome::Cancelled => "cancelled",
        }
    }
}

/// Long-poll engine behind `GET /config`.
pub struct ConfigWatcher {
    config: Arc<ConfigService>,
    notifier: Arc<LongPollNotifier>,
    timeout: Duration,
}

impl ConfigWatcher {
    pub fn new(
        config: Arc<ConfigService>,
        notifier: Arc<LongPollNotifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            config,
            notifier,
            timeout,
        }
    }

    /// Answers "has anything changed since `tag`", waiting up to the
    /// timeout for a change when nothing is pending.
    ///
    /// The check is repeated right after parking so a save landing between
    /// the first check and the subscription is not missed. After a wake the
    /// re-check decides, not the wake itself.
    pub async fn watch(
        &self,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<WatchOutcome> {
        let outcome = self.wait_for_change(tag, cancel).await?;
        WATCH_OUTCOMES.with_label_values(&[outcome.label()]).inc();
        Ok(outcome)
    }

    async fn wait_for_change(
        &self,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<WatchOutcome> {
        if let Some(revision) = self.check(tag).await? {
            return Ok(WatchOutcome::Changed(revision));
        }

        let waiter = self.notifier.subscribe();
        if let Some(revision) = self.check(tag).await? {
            return Ok(WatchOutcome::Changed(revision));
        }

        debug!(tag, "watch parked");
        tokio::select! {
            _ = sleep(self.timeout) => Ok(WatchOutcome::NotModified),
            _ = waiter => match self.check(tag).await? {
                Some(revision) => Ok(WatchOutcome::Changed(revision)),
                None => Ok(WatchOutcome::NotModified),
            },
            _ = cancel.cancelled() => Ok(WatchOutcome::Cancelled),
        }
    }

    /// `None` when there is nothing newer to hand out, including before the
    /// very first save.
    async fn check(
        &self,
        tag: &str,
    ) -> Result<Option<ConfigRevision>> {
        match self.config.get(tag).await {
            Ok(revision) => Ok(Some(revision)),
            Err(Error::NotModified) | Err(Error::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
