#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use d_config::agent::AgentRuntime;
use d_config::agent::FileStateStore;
use d_config::agent::HttpControllerClient;
use d_config::agent::HttpWorkerClient;
use d_config::controller::Controller;
use d_config::controller::ControllerBuilder;
use d_config::controller::UpdateBroker;
use d_config::storage::AgentStore;
use d_config::storage::ConfigStore;
use d_config::worker::Worker;
use d_config::Settings;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::time::sleep;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const ADMIN_SECRET: &str = "admin-secret";
pub const CONTROLLER_SECRET: &str = "controller-secret";
pub const WORKER_SECRET: &str = "worker-secret";
pub const CLIENT_SECRET: &str = "client-secret";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const CONVERGE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn settings(watch_timeout_ms: u64) -> Settings {
    let mut settings = Settings::default();
    settings.auth.admin_secret = ADMIN_SECRET.to_string();
    settings.auth.controller_secret = CONTROLLER_SECRET.to_string();
    settings.auth.worker_secret = WORKER_SECRET.to_string();
    settings.auth.client_secret = CLIENT_SECRET.to_string();
    settings.controller.watch_timeout_ms = watch_timeout_ms;
    settings.controller.poll_interval_seconds = 1;
    settings.agent.request_timeout_ms = REQUEST_TIMEOUT.as_millis() as u64;
    settings
}

fn ephemeral() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

/// Builds a controller on the given stores and broker and serves it on an
/// ephemeral port.
pub async fn start_controller(
    settings: Settings,
    configs: Arc<dyn ConfigStore>,
    agents: Arc<dyn AgentStore>,
    broker: Arc<dyn UpdateBroker>,
    shutdown: CancellationToken,
) -> (Controller, SocketAddr) {
    let controller = ControllerBuilder::new(settings, shutdown)
        .config_store(configs)
        .agent_store(agents)
        .broker(broker)
        .build()
        .await
        .expect("controller builds");
    let (addr, server) = controller.bind(ephemeral()).expect("controller binds");
    tokio::spawn(server);
    (controller, addr)
}

pub fn start_worker(
    settings: &Settings,
    shutdown: CancellationToken,
) -> (Worker, SocketAddr) {
    let worker = Worker::new(settings, shutdown);
    let (addr, server) = worker.bind(ephemeral()).expect("worker binds");
    tokio::spawn(server);
    (worker, addr)
}

pub fn agent_runtime(
    settings: &Settings,
    controller: SocketAddr,
    worker: SocketAddr,
    state_path: &std::path::Path,
) -> AgentRuntime {
    let controller_client =
        HttpControllerClient::new(&format!("http://{controller}"), CONTROLLER_SECRET, REQUEST_TIMEOUT).unwrap();
    let worker_client = HttpWorkerClient::new(&format!("http://{worker}"), WORKER_SECRET, REQUEST_TIMEOUT).unwrap();
    AgentRuntime::new(
        settings,
        Arc::new(controller_client),
        Arc::new(worker_client),
        Arc::new(FileStateStore::new(state_path)),
    )
}

pub async fn admin_save(
    controller: SocketAddr,
    body: &Value,
) -> StatusCode {
    reqwest::Client::new()
        .post(format!("http://{controller}/admin/config"))
        .bearer_auth(ADMIN_SECRET)
        .json(body)
        .send()
        .await
        .unwrap()
        .status()
}

pub async fn register(controller: SocketAddr) -> String {
    let res = reqwest::Client::new()
        .post(format!("http://{controller}/register"))
        .bearer_auth(CONTROLLER_SECRET)
        .json(&serde_json::json!({"name": "it", "host": "localhost"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["agent_id"].as_str().unwrap().to_string()
}

pub async fn watch(
    controller: SocketAddr,
    agent_id: &str,
    etag: Option<&str>,
) -> reqwest::Response {
    let mut req = reqwest::Client::new()
        .get(format!("http://{controller}/config"))
        .bearer_auth(CONTROLLER_SECRET)
        .header("x-agent-id", agent_id)
        .timeout(REQUEST_TIMEOUT);
    if let Some(tag) = etag {
        req = req.header("if-none-match", tag);
    }
    req.send().await.unwrap()
}

pub async fn client_hit(
    worker: SocketAddr,
    token: Option<&str>,
) -> reqwest::Response {
    let mut req = reqwest::Client::new().get(format!("http://{worker}/hit"));
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    req.send().await.unwrap()
}

/// Polls the worker until it serves `expected`.
pub async fn wait_for_worker(
    worker: SocketAddr,
    expected: &Value,
) {
    let deadline = Instant::now() + CONVERGE_TIMEOUT;
    loop {
        let res = client_hit(worker, Some(CLIENT_SECRET)).await;
        if res.status() == StatusCode::OK {
            let body: Value = res.json().await.unwrap();
            if &body == expected {
                return;
            }
        }
        assert!(Instant::now() < deadline, "worker never served {expected}");
        sleep(Duration::from_millis(50)).await;
    }
}
