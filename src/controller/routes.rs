use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use super::AgentService;
use super::ConfigService;
use super::ConfigWatcher;
use super::UpdateBroker;
use super::WatchOutcome;
use crate::constants::AGENT_ID_HEADER;
use crate::constants::ETAG_HEADER;
use crate::constants::IF_NONE_MATCH_HEADER;
use crate::metrics::BROKER_EVENTS;
use crate::metrics::WATCH_OUTCOMES;
use crate::network::error_reply;
use crate::network::handle_rejection;
use crate::network::json_reply;
use crate::network::reject;
use crate::network::with_auth;
use crate::network::with_state;
use crate::network::Authenticator;
use crate::network::Principal;
use crate::network::Role;
use crate::utils::json::decode_document;
use crate::Error;
use crate::RegisterRequest;
use crate::StatusResponse;

/// Upper bound for admin documents and registration bodies
const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

const SAVE_SUCCESS_MESSAGE: &str = "configuration saved successfully";

/// Everything the controller's handlers share.
#[derive(Clone)]
pub struct ControllerState {
    pub config_service: Arc<ConfigService>,
    pub agent_service: Arc<AgentService>,
    pub watcher: Arc<ConfigWatcher>,
    pub broker: Arc<dyn UpdateBroker>,
    pub auth: Arc<Authenticator>,
    /// Cancels parked watches on shutdown
    pub shutdown: CancellationToken,
}

/// `POST /admin/config`, `POST /register` and `GET <poll_url>`.
pub fn controller_routes(
    state: ControllerState,
    poll_url: &str,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let save = warp::path!("admin" / "config")
        .and(warp::post())
        .and(with_auth(state.auth.clone(), &[Role::Admin]))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(handle_save);

    let register = warp::path!("register")
        .and(warp::post())
        .and(with_auth(state.auth.clone(), &[Role::Agent]))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(handle_register);

    let watch = path_filter(poll_url)
        .and(warp::get())
        .and(with_auth(state.auth.clone(), &[Role::Agent]))
        .and(warp::header::optional::<String>(AGENT_ID_HEADER))
        .and(warp::header::optional::<String>(IF_NONE_MATCH_HEADER))
        .and(with_state(state))
        .and_then(handle_watch);

    save.or(register).or(watch).recover(handle_rejection)
}

/// Matches exactly the segments of `path`, e.g. `/config` or `/v1/config`.
fn path_filter(path: &str) -> BoxedFilter<()> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(warp::any().boxed(), |filter, segment| {
            filter.and(warp::path(segment.to_string())).boxed()
        })
        .and(warp::path::end())
        .boxed()
}

async fn handle_save(
    principal: Principal,
    body: Bytes,
    state: ControllerState,
) -> Result<Response, Rejection> {
    let data = decode_document(&body).map_err(|e| {
        warn!("invalid request body: {}", e);
        reject(e)
    })?;

    let revision = state.config_service.save(data).await.map_err(reject)?;
    debug!(role = %principal.role, version = revision.version, "save accepted");

    // fire-and-forget: a broker outage must not fail an accepted save
    let broker = state.broker.clone();
    tokio::spawn(async move {
        match broker.publish().await {
            Ok(()) => BROKER_EVENTS.with_label_values(&["published"]).inc(),
            Err(e) => {
                BROKER_EVENTS.with_label_values(&["publish_failed"]).inc();
                error!("failed to publish update: {:?}", e);
            }
        }
    });

    Ok(json_reply(StatusCode::CREATED, &StatusResponse::success(SAVE_SUCCESS_MESSAGE)))
}

async fn handle_register(
    _principal: Principal,
    body: Bytes,
    state: ControllerState,
) -> Result<Response, Rejection> {
    let request: RegisterRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("invalid request body: {}", e);
        reject(Error::InvalidInput("invalid request body".to_string()))
    })?;

    let registration = state.agent_service.register(request).await.map_err(|e| {
        error!("failed to register new agent: {:?}", e);
        reject(e)
    })?;

    Ok(json_reply(StatusCode::CREATED, &registration))
}

async fn handle_watch(
    _principal: Principal,
    agent_id: Option<String>,
    if_none_match: Option<String>,
    state: ControllerState,
) -> Result<Response, Rejection> {
    let agent_id = agent_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| reject(Error::Unauthorized))?;

    if let Err(e) = state.agent_service.verify(&agent_id).await {
        WATCH_OUTCOMES.with_label_values(&["rejected"]).inc();
        return Err(reject(e));
    }

    let tag = if_none_match.unwrap_or_default();
    let outcome = state.watcher.watch(&tag, &state.shutdown).await.map_err(reject)?;

    if outcome != WatchOutcome::Cancelled {
        if let Err(e) = state.agent_service.touch(&agent_id).await {
            warn!(agent_id, "failed to refresh liveness after watch: {:?}", e);
        }
    }

    let reply = match outcome {
        WatchOutcome::Changed(revision) => {
            debug!(agent_id, version = revision.version, "delivering revision");
            warp::reply::with_header(warp::reply::json(&revision.data), ETAG_HEADER, revision.tag()).into_response()
        }
        WatchOutcome::NotModified => error_reply(&Error::NotModified),
        WatchOutcome::Cancelled => {
            warp::reply::with_status("shutting down".to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response()
        }
    };
    Ok(reply)
}
