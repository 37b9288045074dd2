mod support;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use support::TestApp;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn request_id_is_generated_when_absent() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn request_id_echoes_client_and_correlation_ids() {
    let app = TestApp::new();
    for (header, value) in [("x-request-id", "client-req-123"), ("x-correlation-id", "corr-456")] {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header, value)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers().get("x-request-id").unwrap(), value);
    }
}

#[tokio::test]
async fn request_id_is_attached_to_error_responses() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/admin/sessions")
                .header("x-request-id", "err-req-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get("x-request-id").unwrap(), "err-req-1");
}
