use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use super::WorkerCache;
use crate::network::handle_rejection;
use crate::network::json_reply;
use crate::network::reject;
use crate::network::with_auth;
use crate::network::with_state;
use crate::network::Authenticator;
use crate::network::Principal;
use crate::network::Role;
use crate::StatusResponse;

/// Upper bound for relayed documents
const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

const SAVE_SUCCESS_MESSAGE: &str = "configuration saved successfully";

/// `POST /config` for the agent and `GET /hit` for clients.
pub fn worker_routes(
    cache: Arc<WorkerCache>,
    auth: Arc<Authenticator>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let save = warp::path!("config")
        .and(warp::post())
        .and(with_auth(auth.clone(), &[Role::Agent]))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_state(cache.clone()))
        .and_then(handle_save);

    let hit = warp::path!("hit")
        .and(warp::get())
        .and(with_auth(auth, &[Role::Client]))
        .and(with_state(cache))
        .and_then(handle_hit);

    save.or(hit).recover(handle_rejection)
}

async fn handle_save(
    _principal: Principal,
    body: Bytes,
    cache: Arc<WorkerCache>,
) -> Result<Response, Rejection> {
    cache.save(body).map_err(reject)?;
    Ok(json_reply(StatusCode::OK, &StatusResponse::success(SAVE_SUCCESS_MESSAGE)))
}

async fn handle_hit(
    _principal: Principal,
    cache: Arc<WorkerCache>,
) -> Result<Response, Rejection> {
    let config = cache.get().map_err(|e| {
        debug!("no configuration to serve: {}", e);
        reject(e)
    })?;
    Ok(json_reply(StatusCode::OK, &config))
}
