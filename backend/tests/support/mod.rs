#![allow(dead_code)]
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use bustrack_backend::{
    config::Config,
    models::DriverSeed,
    repositories::{DriverRepository, InMemoryDriverRepository},
    routes::build_router,
    state::AppState,
    types::DriverId,
    utils::time::ManualClock,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const ANA_PHONE: &str = "+639170001111";
pub const ANA_EMAIL: &str = "ana@example.com";
pub const BEN_PHONE: &str = "+639170002222";
pub const CARL_PHONE: &str = "+639170003333";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: ManualClock,
    pub ana: DriverId,
    pub ben: DriverId,
    pub carl: DriverId,
    dispatcher: JoinHandle<()>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0)
        .single()
        .expect("valid start time")
}

pub fn test_config() -> Config {
    Config {
        admin_api_token: ADMIN_TOKEN.to_string(),
        ws_ping_interval_secs: 0,
        ..Config::default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Ana is assigned to BUS-1, Ben has no assignment, Carl is deactivated.
    pub fn with_config(config: Config) -> Self {
        let clock = ManualClock::new(start_time());
        let (ana, ben, carl) = (DriverId::new(), DriverId::new(), DriverId::new());
        let seeds = vec![
            seed(ana, "Ana", ANA_PHONE, Some(ANA_EMAIL), Some(("BUS-1", "R-1")), false),
            seed(ben, "Ben", BEN_PHONE, None, None, false),
            seed(carl, "Carl", CARL_PHONE, None, Some(("BUS-3", "R-3")), true),
        ];
        let drivers: Arc<dyn DriverRepository> = Arc::new(
            InMemoryDriverRepository::from_seeds(seeds, start_time()).expect("seed drivers"),
        );

        let (state, events) = AppState::new(config, drivers, Arc::new(clock.clone()));
        let dispatcher = state.spawn_dispatcher(events);
        let router = build_router(state.clone());
        Self {
            router,
            state,
            clock,
            ana,
            ben,
            carl,
            dispatcher,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("call router");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).to_string())
            })
        };
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request(Method::POST, uri, body)).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("build request"),
        )
        .await
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_TOKEN));
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build admin request");
        self.send(request).await
    }

    /// Logs in by phone and returns the session id.
    pub async fn login(&self, phone: &str, device_id: &str) -> String {
        let (status, body) = self
            .post(
                "/api/driver/login",
                json!({ "phone": phone, "deviceId": device_id }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["sessionId"]
            .as_str()
            .expect("sessionId in login response")
            .to_string()
    }
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build json request")
}

pub fn location_body(
    driver_id: DriverId,
    session_id: &str,
    bus_id: &str,
    latitude: f64,
    longitude: f64,
) -> Value {
    json!({
        "driverId": driver_id.to_string(),
        "busId": bus_id,
        "routeId": "R-1",
        "latitude": latitude,
        "longitude": longitude,
        "heading": 90.0,
        "speed": 11.5,
        "accuracy": 4.0,
        "status": "active",
        "sessionId": session_id,
    })
}

fn seed(
    driver_id: DriverId,
    name: &str,
    phone: &str,
    email: Option<&str>,
    assignment: Option<(&str, &str)>,
    deactivated: bool,
) -> DriverSeed {
    DriverSeed {
        driver_id: Some(driver_id),
        name: name.to_string(),
        phone: phone.to_string(),
        email: email.map(str::to_string),
        license_number: format!("LIC-{}", name.to_uppercase()),
        bus_id: assignment.map(|(bus, _)| bus.to_string()),
        route_id: assignment.map(|(_, route)| route.to_string()),
        deactivated,
    }
}
