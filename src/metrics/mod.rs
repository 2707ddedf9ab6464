
use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    /// Admin saves by outcome: created, not_modified, failed
    pub static ref CONFIG_SAVES: IntCounterVec = IntCounterVec::new(
        Opts::new("config_saves", "admin config saves by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    /// Agent watches by outcome: changed, not_modified, cancelled, rejected
    pub static ref WATCH_OUTCOMES: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_outcomes", "long-poll watch results by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref PARKED_WATCHERS: IntGauge =
        IntGauge::new("parked_watchers", "waiters currently parked on the notifier")
            .expect("metric can not be created");

    /// Broker traffic by event: published, publish_failed, received, resubscribed
    pub static ref BROKER_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("broker_events", "update broker events"),
        &["event"]
    )
    .expect("metric can not be created");

    pub static ref AGENT_REGISTRATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("agent_registrations", "agent registrations by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CONFIG_SAVES.clone()),
        Box::new(WATCH_OUTCOMES.clone()),
        Box::new(PARKED_WATCHERS.clone()),
        Box::new(BROKER_EVENTS.clone()),
        Box::new(AGENT_REGISTRATIONS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            error!("collector can not be registered: {}", e);
        }
    }
}

/// Serves `GET /metrics` until `shutdown` fires.
pub async fn start_server(
    port: u16,
    shutdown: CancellationToken,
) {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));

    let metrics_route = warp::path!("metrics").and(warp::get()).and_then(metrics_handler);

    match warp::serve(metrics_route).try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
        shutdown.cancelled().await;
    }) {
        Ok((addr, server)) => {
            info!("metrics server listening on {}", addr);
            server.await;
        }
        Err(e) => error!("failed to start metrics server on port {}: {}", port, e),
    }
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(gather_text(&REGISTRY))
}

pub(crate) fn gather_text(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
