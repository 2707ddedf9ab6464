use std::sync::Arc;

use warp::http::StatusCode;
use warp::Filter;

use super::*;
use crate::Error;
use crate::StorageError;

fn routes() -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    let auth = Arc::new(Authenticator::new(vec![
        ("admin".to_string(), Role::Admin),
        ("agent".to_string(), Role::Agent),
    ]));

    warp::path!("admin")
        .and(warp::post())
        .and(with_auth(auth, &[Role::Admin]))
        .map(|principal: Principal| principal.role.to_string())
        .recover(handle_rejection)
}

#[tokio::test]
async fn test_auth_filter_accepts_allowed_role() {
    let res = warp::test::request()
        .method("POST")
        .path("/admin")
        .header("authorization", "Bearer admin")
        .reply(&routes())
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.body(), "admin");
}

#[tokio::test]
async fn test_auth_filter_rejects_wrong_role_and_unknown_token() {
    let forbidden = warp::test::request()
        .method("POST")
        .path("/admin")
        .header("authorization", "Bearer agent")
        .reply(&routes())
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let unauthorized = warp::test::request()
        .method("POST")
        .path("/admin")
        .header("authorization", "Bearer nope")
        .reply(&routes())
        .await;
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unauthorized.body(), "unauthorized");
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let res = warp::test::request().method("POST").path("/nope").reply(&routes()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_error_reply_status_mapping() {
    let cases = [
        (Error::NotFound, StatusCode::NOT_FOUND),
        (Error::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
        (Error::Unauthorized, StatusCode::UNAUTHORIZED),
        (Error::Forbidden, StatusCode::FORBIDDEN),
        (Error::InActive, StatusCode::FORBIDDEN),
        (Error::Conflict, StatusCode::CONFLICT),
        (Error::NotModified, StatusCode::NOT_MODIFIED),
        (Error::Fatal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (err, expected) in cases {
        assert_eq!(error_reply(&err).status(), expected, "{err:?}");
    }
}

#[tokio::test]
async fn test_internal_errors_hide_details() {
    let err: Error = StorageError::VersionConflict(3).into();
    let reply = error_reply(&err);
    assert_eq!(reply.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = warp::hyper::body::to_bytes(reply.into_body()).await.unwrap();
    assert_eq!(body, crate::INTERNAL_ERROR_MESSAGE);
}
