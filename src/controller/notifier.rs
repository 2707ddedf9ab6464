use std::mem;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::metrics::PARKED_WATCHERS;

/// Per-instance registry of parked watch requests.
///
/// Every waiter is a single-use, single-slot channel. A broadcast swaps the
/// whole list out under the lock and signals the captured waiters after the
/// lock is released, so a watcher subscribing during fan-out lands in the
/// fresh list and is woken by the next broadcast, never by a stale one.
#[derive(Debug, Default)]
pub struct LongPollNotifier {
    waiters: Mutex<Vec<oneshot::Sender<()>>>,
}

impl LongPollNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a new waiter. The receiver completes on the next broadcast,
    /// either with a signal or with a closed channel.
    ///
    /// Waiters whose receiver is gone (disconnected watch) are dropped here.
    pub fn subscribe(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.waiters.lock();
        waiters.retain(|waiter| !waiter.is_closed());
        waiters.push(tx);
        PARKED_WATCHERS.set(waiters.len() as i64);
        rx
    }

    /// Wakes every waiter parked on this instance, returning how many were
    /// still listening.
    pub fn broadcast_local(&self) -> usize {
        let waiters = mem::take(&mut *self.waiters.lock());
        PARKED_WATCHERS.set(0);

        let total = waiters.len();
        let woken = waiters
            .into_iter()
            .map(|waiter| waiter.send(()))
            .filter(Result::is_ok)
            .count();
        debug!(total, woken, "local fan-out complete");
        woken
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}
