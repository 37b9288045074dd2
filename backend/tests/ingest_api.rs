mod support;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::Duration;
use serde_json::json;
use support::{location_body, TestApp, ANA_PHONE, BEN_PHONE};

#[tokio::test]
async fn accepted_report_appears_verbatim_in_live_snapshot() {
    let app = TestApp::new();
    let session_id = app.login(ANA_PHONE, "dev-A").await;

    let (status, body) = app
        .post(
            "/api/driver/location",
            location_body(app.ana, &session_id, "BUS-1", 14.5995, 120.9842),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    let (status, live) = app.get("/api/buses/live").await;
    assert_eq!(status, StatusCode::OK);
    let buses = live.as_array().expect("array");
    assert_eq!(buses.len(), 1);
    let bus = &buses[0];
    assert_eq!(bus["busId"], "BUS-1");
    assert_eq!(bus["routeId"], "R-1");
    assert_eq!(bus["driverId"], app.ana.to_string());
    assert_eq!(bus["location"]["latitude"], 14.5995);
    assert_eq!(bus["location"]["longitude"], 120.9842);
    assert_eq!(bus["location"]["heading"], 90.0);
    assert_eq!(bus["location"]["speed"], 11.5);
    assert_eq!(bus["location"]["accuracy"], 4.0);
    assert_eq!(bus["status"], "active");
    assert_eq!(bus["isActive"], true);
    assert!(bus.get("sessionId").is_none());
}

#[tokio::test]
async fn device_binding_scenario_ends_in_expiry() {
    let app = TestApp::new();
    let session_id = app.login(ANA_PHONE, "dev-A").await;

    app.clock.advance(Duration::hours(1));
    let (status, body) = app
        .post(
            "/api/driver/login",
            json!({ "phone": ANA_PHONE, "deviceId": "dev-B" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DEVICE_MISMATCH");

    app.clock.advance(Duration::hours(1));
    let report = location_body(app.ana, &session_id, "BUS-1", 14.6, 121.0);
    let (status, _) = app.post("/api/driver/location", report.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (_, live) = app.get("/api/buses/live").await;
    assert_eq!(live[0]["location"]["latitude"], 14.6);

    app.clock.advance(Duration::hours(23));
    let (status, body) = app.post("/api/driver/location", report).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "SESSION_EXPIRED");

    let (_, live) = app.get("/api/buses/live").await;
    assert_eq!(live[0]["isActive"], false);
}

#[tokio::test]
async fn rejections_follow_documented_codes() {
    let app = TestApp::new();
    let session_id = app.login(ANA_PHONE, "dev-A").await;

    let (status, body) = app
        .post(
            "/api/driver/location",
            location_body(app.ana, &uuid::Uuid::new_v4().to_string(), "BUS-1", 1.0, 1.0),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");

    let (status, body) = app
        .post(
            "/api/driver/location",
            location_body(app.ben, &session_id, "BUS-1", 1.0, 1.0),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "SESSION_DRIVER_MISMATCH");

    let (status, body) = app
        .post(
            "/api/driver/location",
            location_body(app.ana, &session_id, "BUS-1", 91.0, 1.0),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .post(
            "/api/driver/location",
            location_body(app.ana, &session_id, "BUS-9", 1.0, 1.0),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let mut with_device = location_body(app.ana, &session_id, "BUS-1", 1.0, 1.0);
    with_device["deviceId"] = json!("dev-Z");
    let (status, body) = app.post("/api/driver/location", with_device).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DEVICE_MISMATCH");

    let (_, live) = app.get("/api/buses/live").await;
    assert_eq!(live.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn device_header_is_checked_when_body_omits_it() {
    let app = TestApp::new();
    let session_id = app.login(BEN_PHONE, "dev-B").await;

    let request = |device: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/driver/location")
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Device-Id", device)
            .body(Body::from(
                location_body(app.ben, &session_id, "BUS-7", 2.0, 2.0).to_string(),
            ))
            .expect("build request")
    };

    let (status, body) = app.send(request("dev-X")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DEVICE_MISMATCH");

    let (status, _) = app.send(request("dev-B")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_reports_do_not_grow_history() {
    let app = TestApp::new();
    let session_id = app.login(ANA_PHONE, "dev-A").await;

    let mut report = location_body(app.ana, &session_id, "BUS-1", 3.0, 3.0);
    report["timestamp"] = json!("2025-03-01T06:00:05Z");
    for _ in 0..2 {
        let (status, _) = app.post("/api/driver/location", report.clone()).await;
        assert_eq!(status, StatusCode::OK);
    }

    report["timestamp"] = json!("2025-03-01T06:00:10Z");
    report["latitude"] = json!(3.5);
    app.post("/api/driver/location", report).await;

    let (status, history) = app.get("/api/buses/BUS-1/history").await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().expect("array");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["latitude"], 3.0);
    assert_eq!(history[1]["latitude"], 3.5);

    let (status, _) = app.get("/api/buses/BUS-404/history").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sliding_expiry_extends_session_on_each_report() {
    let app = TestApp::with_config(bustrack_backend::config::Config {
        session_sliding_expiry: true,
        ..support::test_config()
    });
    let session_id = app.login(ANA_PHONE, "dev-A").await;

    app.clock.advance(Duration::hours(20));
    let (status, _) = app
        .post(
            "/api/driver/location",
            location_body(app.ana, &session_id, "BUS-1", 4.0, 4.0),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance(Duration::hours(20));
    let (status, body) = app
        .post("/api/driver/validate-session", json!({ "sessionId": session_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isActive"], true);
}

#[tokio::test]
async fn accepted_report_marks_driver_seen() {
    let app = TestApp::new();
    let session_id = app.login(ANA_PHONE, "dev-A").await;
    app.post(
        "/api/driver/location",
        location_body(app.ana, &session_id, "BUS-1", 5.0, 5.0),
    )
    .await;

    let (_, presence) = app
        .get(&format!("/api/drivers/{}/presence", app.ana))
        .await;
    assert_eq!(presence["seenRecently"], true);
    assert_eq!(presence["isOnline"], false);

    app.clock.advance(Duration::minutes(6));
    let (_, presence) = app
        .get(&format!("/api/drivers/{}/presence", app.ana))
        .await;
    assert_eq!(presence["seenRecently"], false);
}
