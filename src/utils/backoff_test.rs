use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::utils::backoff::sleep_or_cancelled;
use crate::utils::backoff::ExponentialBackoff;
use crate::BackoffPolicy;
use crate::RetryPolicies;

fn secs(delays: &[Duration]) -> Vec<u64> {
    delays.iter().map(|d| d.as_secs()).collect()
}

#[test]
fn registration_backoff_doubles_and_caps_at_thirty_seconds() {
    let mut backoff = ExponentialBackoff::new(RetryPolicies::default().registration);

    let delays: Vec<Duration> = (0..8).map(|_| backoff.next_delay()).collect();

    assert_eq!(secs(&delays), vec![1, 2, 4, 8, 16, 30, 30, 30]);
    assert_eq!(backoff.attempts(), 8);
    assert!(!backoff.is_exhausted());
}

#[test]
fn polling_backoff_caps_at_one_minute() {
    let mut backoff = ExponentialBackoff::new(RetryPolicies::default().polling);

    let delays: Vec<Duration> = (0..8).map(|_| backoff.next_delay()).collect();

    assert_eq!(secs(&delays), vec![1, 2, 4, 8, 16, 32, 60, 60]);
}

#[test]
fn reset_starts_sequence_over() {
    let mut backoff = ExponentialBackoff::new(RetryPolicies::default().polling);
    backoff.next_delay();
    backoff.next_delay();
    assert_eq!(backoff.peek(), Duration::from_secs(4));

    backoff.reset();

    assert_eq!(backoff.peek(), Duration::from_secs(1));
    assert_eq!(backoff.attempts(), 0);
}

#[test]
fn bounded_policy_reports_exhaustion() {
    let mut backoff = ExponentialBackoff::new(BackoffPolicy {
        max_retries: 2,
        base_delay_ms: 10,
        max_delay_ms: 100,
    });

    backoff.next_delay();
    assert!(!backoff.is_exhausted());
    backoff.next_delay();
    assert!(backoff.is_exhausted());
}

#[tokio::test(start_paused = true)]
async fn sleep_completes_without_cancellation() {
    let cancel = CancellationToken::new();
    assert!(sleep_or_cancelled(Duration::from_secs(5), &cancel).await);
}

#[tokio::test(start_paused = true)]
async fn sleep_is_interrupted_by_cancellation() {
    let cancel = CancellationToken::new();
    let child = cancel.clone();
    let handle = tokio::spawn(async move { sleep_or_cancelled(Duration::from_secs(3600), &child).await });

    tokio::time::advance(Duration::from_millis(10)).await;
    cancel.cancel();

    assert!(!handle.await.unwrap());
}
