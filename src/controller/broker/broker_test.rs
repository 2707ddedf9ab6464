use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;

use super::*;
use crate::BrokerConfig;

#[tokio::test]
async fn test_local_broker_reaches_every_subscription() {
    let broker = LocalBroker::default();
    let mut first = broker.subscribe().await.unwrap();
    let mut second = broker.clone().subscribe().await.unwrap();

    broker.publish().await.unwrap();

    for stream in [&mut first, &mut second] {
        let item = timeout(Duration::from_secs(1), stream.next()).await.unwrap();
        assert!(matches!(item, Some(Ok(()))));
    }
}

#[tokio::test]
async fn test_local_broker_publish_without_subscribers_is_ok() {
    let broker = LocalBroker::default();
    assert!(broker.publish().await.is_ok());
}

#[tokio::test]
async fn test_lagged_subscription_still_signals() {
    let broker = LocalBroker::new(1);
    let mut stream = broker.subscribe().await.unwrap();

    for _ in 0..5 {
        broker.publish().await.unwrap();
    }

    let item = timeout(Duration::from_secs(1), stream.next()).await.unwrap();
    assert!(matches!(item, Some(Ok(()))));
}

#[test]
fn test_redis_broker_rejects_malformed_url() {
    let config = BrokerConfig {
        redis_url: "not a url".to_string(),
        ..BrokerConfig::default()
    };
    assert!(RedisBroker::new(&config).is_err());
}

#[test]
fn test_redis_broker_accepts_url_without_connecting() {
    let config = BrokerConfig {
        redis_url: "redis://127.0.0.1:1".to_string(),
        ..BrokerConfig::default()
    };
    assert!(RedisBroker::new(&config).is_ok());
}
