mod support;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::{net::SocketAddr, time::Duration};
use support::{location_body, TestApp, ANA_PHONE, BEN_PHONE};
use tokio::{net::TcpStream, task::JoinHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::frame::coding::CloseCode, Message},
    MaybeTlsStream, WebSocketStream,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn serve(app: &TestApp) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    let router = app.router.clone();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    (addr, handle)
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("connect websocket");
    socket
}

async fn next_frame(socket: &mut Socket) -> Message {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, socket.next())
            .await
            .expect("frame before timeout")
            .expect("stream open")
            .expect("valid frame");
        if !matches!(frame, Message::Ping(_) | Message::Pong(_)) {
            return frame;
        }
    }
}

async fn next_json(socket: &mut Socket) -> Value {
    match next_frame(socket).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).expect("json envelope"),
        other => panic!("expected text frame, got {:?}", other),
    }
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(Message::text(value.to_string()))
        .await
        .expect("send frame");
}

fn manila_bounds() -> Value {
    json!({ "north": 15.0, "south": 14.0, "east": 121.5, "west": 120.5 })
}

async fn subscribe(socket: &mut Socket, area: &str, bounds: Value) -> Value {
    send_json(socket, json!({ "type": "subscribe", "area": area, "bounds": bounds })).await;
    let ack = next_json(socket).await;
    assert_eq!(ack["type"], "subscribed");
    assert_eq!(ack["area"], area);
    let initial = next_json(socket).await;
    assert_eq!(initial["type"], "initial_locations");
    initial
}

#[tokio::test]
async fn connection_greeting_and_ping_pong() {
    let app = TestApp::new();
    let (addr, server) = serve(&app).await;
    let mut socket = connect(addr).await;

    let greeting = next_json(&mut socket).await;
    assert_eq!(greeting["type"], "connection");
    assert!(greeting["clientId"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(greeting["timestamp"].is_string());

    send_json(&mut socket, json!({ "type": "ping" })).await;
    let pong = next_json(&mut socket).await;
    assert_eq!(pong["type"], "pong");

    server.abort();
}

#[tokio::test]
async fn malformed_messages_get_error_envelope_without_closing() {
    let app = TestApp::new();
    let (addr, server) = serve(&app).await;
    let mut socket = connect(addr).await;
    next_json(&mut socket).await;

    socket
        .send(Message::text("{not json"))
        .await
        .expect("send garbage");
    let error = next_json(&mut socket).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["data"]["code"], "INVALID_MESSAGE");

    send_json(
        &mut socket,
        json!({ "type": "subscribe", "area": "bad", "bounds": { "north": 1.0, "south": 2.0, "east": 1.0, "west": 0.0 } }),
    )
    .await;
    let error = next_json(&mut socket).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["data"]["code"], "INVALID_SUBSCRIPTION");

    send_json(&mut socket, json!({ "type": "ping" })).await;
    assert_eq!(next_json(&mut socket).await["type"], "pong");

    server.abort();
}

#[tokio::test]
async fn subscriber_gets_snapshot_and_only_matching_updates() {
    let app = TestApp::new();
    let (addr, server) = serve(&app).await;

    let ana_session = app.login(ANA_PHONE, "dev-A").await;
    let ben_session = app.login(BEN_PHONE, "dev-B").await;
    app.post(
        "/api/driver/location",
        location_body(app.ana, &ana_session, "BUS-1", 14.55, 121.0),
    )
    .await;

    let mut socket = connect(addr).await;
    next_json(&mut socket).await;
    let initial = subscribe(&mut socket, "manila", manila_bounds()).await;
    let buses = initial["data"].as_array().expect("snapshot array");
    assert_eq!(buses.len(), 1);
    assert_eq!(buses[0]["busId"], "BUS-1");

    // Outside the subscribed box.
    let (status, _) = app
        .post(
            "/api/driver/location",
            location_body(app.ben, &ben_session, "BUS-7", 10.3, 123.9),
        )
        .await;
    assert_eq!(status, axum::http::StatusCode::OK);

    let report = location_body(app.ana, &ana_session, "BUS-1", 14.6, 121.05);
    app.post("/api/driver/location", report).await;

    let update = next_json(&mut socket).await;
    assert_eq!(update["type"], "location_update");
    assert_eq!(update["data"]["busId"], "BUS-1");
    assert_eq!(update["data"]["location"]["latitude"], 14.6);
    assert_eq!(update["data"]["location"]["longitude"], 121.05);
    assert_eq!(update["data"]["location"]["heading"], 90.0);
    assert_eq!(update["data"]["location"]["speed"], 11.5);
    assert_eq!(update["data"]["isActive"], true);

    send_json(&mut socket, json!({ "type": "unsubscribe", "area": "manila" })).await;
    assert_eq!(next_json(&mut socket).await["type"], "unsubscribed");

    app.post(
        "/api/driver/location",
        location_body(app.ana, &ana_session, "BUS-1", 14.7, 121.1),
    )
    .await;
    send_json(&mut socket, json!({ "type": "ping" })).await;
    assert_eq!(
        next_json(&mut socket).await["type"],
        "pong",
        "no updates after unsubscribe"
    );

    server.abort();
}

#[tokio::test]
async fn driver_status_changes_reach_every_client() {
    let app = TestApp::new();
    let (addr, server) = serve(&app).await;
    let session_id = app.login(ANA_PHONE, "dev-A").await;

    let mut subscribed = connect(addr).await;
    next_json(&mut subscribed).await;
    subscribe(&mut subscribed, "manila", manila_bounds()).await;
    let mut idle = connect(addr).await;
    next_json(&mut idle).await;

    app.post(
        "/api/driver/status",
        json!({ "driverId": app.ana.to_string(), "sessionId": session_id, "status": "online" }),
    )
    .await;

    for socket in [&mut subscribed, &mut idle] {
        let event = next_json(socket).await;
        assert_eq!(event["type"], "driver_status");
        assert_eq!(event["data"]["driverId"], app.ana.to_string());
        assert_eq!(event["data"]["status"], "online");
        assert_eq!(event["data"]["busId"], "BUS-1");
    }

    server.abort();
}

#[tokio::test]
async fn shutdown_notifies_observers_and_closes_going_away() {
    let app = TestApp::new();
    let (addr, server) = serve(&app).await;
    let mut socket = connect(addr).await;
    next_json(&mut socket).await;

    // Wait until the connection is registered before shutting down.
    send_json(&mut socket, json!({ "type": "ping" })).await;
    next_json(&mut socket).await;
    assert_eq!(app.state.gateway.clients.client_count(), 1);

    app.state.gateway.shutdown();

    let notice = next_json(&mut socket).await;
    assert_eq!(notice["type"], "shutdown");
    match next_frame(&mut socket).await {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Away),
        other => panic!("expected close frame, got {:?}", other),
    }

    server.abort();
}

#[tokio::test]
async fn disconnect_releases_client_and_subscriptions() {
    let app = TestApp::new();
    let (addr, server) = serve(&app).await;
    let mut socket = connect(addr).await;
    next_json(&mut socket).await;
    subscribe(&mut socket, "manila", manila_bounds()).await;
    assert_eq!(app.state.gateway.subscriptions.count(), 1);

    socket.close(None).await.expect("close");
    drop(socket);

    let mut released = false;
    for _ in 0..50 {
        if app.state.gateway.clients.client_count() == 0 {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(released, "client should be unregistered after close");
    assert_eq!(app.state.gateway.subscriptions.count(), 0);

    server.abort();
}
