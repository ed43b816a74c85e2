//! Router-level tests for `/status`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use shaper_api::{StatusState, status_router};
use shaper_controller::ControllerHandle;

async fn call(state: StatusState, method: Method, uri: &str) -> (StatusCode, String) {
    let resp = status_router(state)
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn status_answers_every_method() {
    let state = StatusState::new(Arc::new(ControllerHandle::default()));
    for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
        let (status, body) = call(state.clone(), method.clone(), "/status").await;
        assert_eq!(status, StatusCode::OK, "{method}");
        assert_eq!(
            body,
            r#"{"state":"Initializing","ociError":"","estimatorError":""}"#
        );
    }
}

#[tokio::test]
async fn unwired_router_is_unavailable() {
    let (status, body) = call(StatusState::default(), Method::GET, "/status").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "controller unavailable");
}

#[tokio::test]
async fn other_paths_are_not_found() {
    let state = StatusState::new(Arc::new(ControllerHandle::default()));
    let (status, _) = call(state, Method::GET, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
