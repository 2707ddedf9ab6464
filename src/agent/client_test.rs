use std::net::SocketAddr;
use std::time::Duration;

use serde_json::json;
use serde_json::Value;
use warp::http::StatusCode;
use warp::Filter;
use warp::Reply;

use super::*;
use crate::Error;
use crate::NetworkError;
use crate::SystemError;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Minimal controller/worker double answering by agent id.
fn spawn_fake_server() -> SocketAddr {
    let register = warp::path!("register")
        .and(warp::post())
        .and(warp::header::<String>("authorization"))
        .and(warp::body::json())
        .map(|auth: String, body: Value| {
            if auth != "Bearer secret" {
                return warp::reply::with_status("unauthorized", StatusCode::UNAUTHORIZED).into_response();
            }
            assert_eq!(body["name"], "edge");
            warp::reply::with_status(
                warp::reply::json(&json!({
                    "agent_id": "a-1",
                    "poll_url": "/config",
                    "poll_interval_seconds": 30
                })),
                StatusCode::CREATED,
            )
            .into_response()
        });

    let config = warp::path!("config")
        .and(warp::get())
        .and(warp::header::<String>("x-agent-id"))
        .and(warp::header::optional::<String>("if-none-match"))
        .map(|agent_id: String, etag: Option<String>| match agent_id.as_str() {
            "inactive" => warp::reply::with_status("agent inactive", StatusCode::FORBIDDEN).into_response(),
            "ghost" => warp::reply::with_status("resource not found", StatusCode::NOT_FOUND).into_response(),
            "broken" => warp::reply::with_status("internal server error", StatusCode::INTERNAL_SERVER_ERROR)
                .into_response(),
            _ if etag.as_deref() == Some("v2") => StatusCode::NOT_MODIFIED.into_response(),
            _ => warp::reply::with_header(warp::reply::json(&json!({"x": 2})), "etag", "v2").into_response(),
        });

    let push = warp::path!("config")
        .and(warp::post())
        .and(warp::body::json())
        .map(|body: Value| {
            if body == json!({"reject": true}) {
                warp::reply::with_status("resource conflict", StatusCode::CONFLICT).into_response()
            } else {
                warp::reply::json(&json!({"status": "success", "message": "ok"})).into_response()
            }
        });

    let (addr, server) = warp::serve(register.or(config).or(push)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn controller(addr: SocketAddr) -> HttpControllerClient {
    HttpControllerClient::new(&format!("http://{addr}/"), "secret", TIMEOUT).unwrap()
}

#[tokio::test]
async fn test_register_parses_registration() {
    let addr = spawn_fake_server();

    let registration = controller(addr).register("edge", "host-1").await.unwrap();

    assert_eq!(registration.agent_id, "a-1");
    assert_eq!(registration.poll_url, "/config");
    assert_eq!(registration.poll_interval_seconds, 30);
}

#[tokio::test]
async fn test_register_with_wrong_secret_is_unauthorized() {
    let addr = spawn_fake_server();
    let client = HttpControllerClient::new(&format!("http://{addr}"), "wrong", TIMEOUT).unwrap();

    assert!(matches!(client.register("edge", "h").await, Err(Error::Unauthorized)));
}

#[tokio::test]
async fn test_fetch_reads_document_and_etag() {
    let addr = spawn_fake_server();

    let outcome = controller(addr).fetch_config("a-1", "v1", "/config").await.unwrap();

    assert_eq!(
        outcome,
        FetchOutcome::Updated {
            etag: "v2".to_string(),
            config: json!({"x": 2}),
        }
    );
}

#[tokio::test]
async fn test_fetch_not_modified() {
    let addr = spawn_fake_server();

    let outcome = controller(addr).fetch_config("a-1", "v2", "/config").await.unwrap();

    assert_eq!(outcome, FetchOutcome::NotModified);
}

#[tokio::test]
async fn test_fetch_maps_identity_rejections() {
    let addr = spawn_fake_server();
    let client = controller(addr);

    let inactive = client.fetch_config("inactive", "", "/config").await.unwrap_err();
    let unknown = client.fetch_config("ghost", "", "/config").await.unwrap_err();
    let broken = client.fetch_config("broken", "", "/config").await.unwrap_err();

    assert!(inactive.is_identity_rejected());
    assert!(unknown.is_identity_rejected());
    assert!(!broken.is_identity_rejected());
    assert!(matches!(
        broken,
        Error::System(SystemError::Network(NetworkError::UnexpectedStatus { status: 500, .. }))
    ));
}

#[tokio::test]
async fn test_push_config_reports_worker_rejection() {
    let addr = spawn_fake_server();
    let worker = HttpWorkerClient::new(&format!("http://{addr}"), "secret", TIMEOUT).unwrap();

    assert!(worker.push_config(&json!({"x": 1})).await.is_ok());
    assert!(worker.push_config(&json!({"reject": true})).await.is_err());
}

#[tokio::test]
async fn test_unreachable_controller_is_transport_error() {
    // nothing listens on port 1
    let client = HttpControllerClient::new("http://127.0.0.1:1", "secret", TIMEOUT).unwrap();

    let err = client.fetch_config("a-1", "", "/config").await.unwrap_err();

    assert!(matches!(err, Error::System(SystemError::Network(NetworkError::Http(_)))));
}

#[test]
fn test_invalid_base_url_is_rejected() {
    assert!(matches!(
        HttpControllerClient::new("not a url", "secret", TIMEOUT),
        Err(Error::System(SystemError::Network(NetworkError::InvalidURL(_))))
    ));
}
