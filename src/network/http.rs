use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::warn;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::reply::Response;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use super::Authenticator;
use super::Principal;
use super::Role;
use crate::Error;
use crate::NetworkError;
use crate::Result;
use crate::INTERNAL_ERROR_MESSAGE;

/// Carries a crate error through warp's rejection path to [`handle_rejection`].
#[derive(Debug)]
pub struct ApiRejection(pub Error);

impl Reject for ApiRejection {}

pub fn reject(err: Error) -> Rejection {
    warp::reject::custom(ApiRejection(err))
}

/// Extracts the caller's [`Principal`] and rejects roles outside `allowed`.
pub fn with_auth(
    auth: Arc<Authenticator>,
    allowed: &'static [Role],
) -> impl Filter<Extract = (Principal,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let auth = auth.clone();
        async move {
            let principal = auth.authenticate(header.as_deref()).map_err(reject)?;
            principal.require(allowed).map_err(reject)?;
            Ok::<_, Rejection>(principal)
        }
    })
}

/// Injects a shared handle into the filter chain.
pub fn with_state<T: Clone + Send>(state: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn json_reply<T: Serialize>(
    status: StatusCode,
    body: &T,
) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

/// Maps an error to its fixed status code and public message.
///
/// `NotModified` is answered with an empty 304; everything that maps to 500
/// hides its details behind [`INTERNAL_ERROR_MESSAGE`].
pub fn error_reply(err: &Error) -> Response {
    let status = err.status_code();
    if status == StatusCode::NOT_MODIFIED {
        return warp::reply::with_status(warp::reply(), status).into_response();
    }
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request failed: {:?}", err);
    }
    warp::reply::with_status(err.public_message(), status).into_response()
}

pub async fn handle_rejection(rejection: Rejection) -> std::result::Result<Response, Infallible> {
    if let Some(ApiRejection(err)) = rejection.find::<ApiRejection>() {
        return Ok(error_reply(err));
    }

    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found")
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload too large")
    } else if rejection.find::<warp::reject::InvalidHeader>().is_some() {
        (StatusCode::BAD_REQUEST, "invalid header")
    } else {
        warn!("unhandled rejection: {:?}", rejection);
        (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    };
    Ok(warp::reply::with_status(message.to_string(), status).into_response())
}

/// Binds `routes` on `addr` and returns the bound address with the server
/// future, which completes once `shutdown` is cancelled and in-flight
/// requests have drained.
pub fn bind_server<F>(
    routes: F,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(SocketAddr, impl Future<Output = ()>)>
where
    F: Filter<Error = Infallible> + Clone + Send + Sync + 'static,
    F::Extract: Reply,
{
    warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, async move { shutdown.cancelled().await })
        .map_err(|e| {
            error!("failed to bind {}: {}", addr, e);
            NetworkError::Bind {
                address: addr.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
}
