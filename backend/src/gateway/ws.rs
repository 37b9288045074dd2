//! WebSocket endpoint for observers.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    gateway::{
        client::{ClientState, CLOSE_GOING_AWAY, SHUTDOWN_REASON},
        error::{GatewayError, Result},
        protocol::{ClientMessage, Envelope},
    },
    models::LiveBus,
    state::AppState,
};

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(state.config.ws_client_buffer.max(1));

    let client = Arc::new(ClientState::new(tx, state.clock.now()));
    let client_id = state.gateway.clients.register(client.clone());
    let mut shutdown = state.gateway.shutdown_receiver();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_tx.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    if let Err(e) = client.send(&Envelope::connection(client_id, state.clock.now())) {
        warn!("Failed to greet client {}: {:?}", client_id, e);
    }
    info!("Client {} connected", client_id);

    // A client that registered after the shutdown broadcast still gets the notice.
    let late_for_shutdown = *shutdown.borrow_and_update();
    if late_for_shutdown {
        let _ = client.send(&Envelope::shutdown(state.clock.now()));
        client.close(CLOSE_GOING_AWAY, SHUTDOWN_REASON);
    }

    let mut ping_interval = state.config.ws_ping_interval().map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    while !late_for_shutdown {
        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                debug!("Closing client {} for shutdown", client_id);
                break;
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Client {} sent close {:?}", client_id, frame);
                        break;
                    }
                    Some(Ok(msg)) => {
                        if let Err(e) = handle_message(&state, &client, msg) {
                            warn!("Error handling message from {}: {}", client_id, e);
                            let _ = client.send(&Envelope::error(
                                e.code(),
                                e.to_string(),
                                state.clock.now(),
                            ));
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {:?}", client_id, e);
                        break;
                    }
                    None => break,
                }
            }

            _ = next_tick(&mut ping_interval) => {
                if client.tx.is_closed() {
                    break;
                }
                client.try_send_raw(Message::Ping(Bytes::new()));
            }
        }
    }

    let removed = state.gateway.subscriptions.remove_client(&client_id);
    state.gateway.clients.unregister(&client_id);
    let connected_secs = (state.clock.now() - client.connected_at).num_seconds();
    drop(client);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }

    info!(
        subscriptions = removed,
        connected_secs,
        "Client {} disconnected", client_id
    );
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn handle_message(state: &AppState, client: &Arc<ClientState>, msg: Message) -> Result<()> {
    match msg {
        Message::Text(text) => {
            let client_msg: ClientMessage = serde_json::from_str(text.as_str())?;
            handle_client_message(state, client, client_msg)
        }
        Message::Binary(data) => {
            let client_msg: ClientMessage = serde_json::from_slice(&data)?;
            handle_client_message(state, client, client_msg)
        }
        // Transport-level pings are answered by the socket itself.
        Message::Ping(_) | Message::Pong(_) => Ok(()),
        Message::Close(_) => Err(GatewayError::UnsupportedFrame),
    }
}

fn handle_client_message(
    state: &AppState,
    client: &Arc<ClientState>,
    msg: ClientMessage,
) -> Result<()> {
    let now = state.clock.now();
    match msg {
        ClientMessage::Subscribe { area, bounds } => {
            debug!("Client {} subscribing to {}", client.id, area);
            // Broadcasts matched against the new subscription queue behind the snapshot.
            let _order = client.lock_sends();
            state
                .gateway
                .subscriptions
                .subscribe(client.id, &area, bounds)?;
            client.send(&Envelope::subscribed(&area, &bounds, now))?;

            let snapshot: Vec<LiveBus> = state
                .locations
                .live(|session_id| state.sessions.is_valid(session_id))
                .into_iter()
                .filter(|bus| bounds.contains(bus.location.latitude, bus.location.longitude))
                .collect();
            client.send(&Envelope::initial_locations(&area, &snapshot, now))?;
            Ok(())
        }
        ClientMessage::Unsubscribe { area } => {
            let removed = state.gateway.subscriptions.unsubscribe(&client.id, &area);
            debug!(removed, "Client {} unsubscribed from {}", client.id, area);
            client.send(&Envelope::unsubscribed(&area, now))
        }
        ClientMessage::Ping => client.send(&Envelope::pong(now)),
    }
}
