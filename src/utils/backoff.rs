use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::BackoffPolicy;

/// Doubling delay sequence capped at the policy maximum.
///
/// `next_delay` hands out `base, 2*base, 4*base, ...` until it reaches
/// `max`, after which it keeps returning `max`. `reset` starts over.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    current: Duration,
    attempts: usize,
}

impl ExponentialBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.base_delay().min(policy.max_delay()),
            attempts: 0,
        }
    }

    /// Returns the delay to wait now and advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.policy.max_delay());
        self.attempts += 1;
        delay
    }

    /// Delay the next call to `next_delay` will return.
    pub fn peek(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.policy.base_delay().min(self.policy.max_delay());
        self.attempts = 0;
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// `max_retries == 0` never exhausts.
    pub fn is_exhausted(&self) -> bool {
        self.policy.max_retries != 0 && self.attempts >= self.policy.max_retries
    }
}

/// Sleeps for `delay` unless `cancel` fires first.
///
/// Returns `false` when the sleep was interrupted by cancellation.
pub async fn sleep_or_cancelled(
    delay: Duration,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => true,
    }
}
