//! Connected observer endpoints.
//!
//! Each client owns a bounded outbound queue drained by its socket writer;
//! broadcasts use `try_send` so a slow reader never stalls the dispatcher.
//! Anything that must reach one client as a contiguous run of frames holds
//! [`ClientState::lock_sends`] while queueing them.

use axum::extract::ws::{CloseFrame, Message};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    gateway::{
        error::{GatewayError, Result},
        protocol::Envelope,
    },
    types::ClientId,
};

/// Close code sent to observers when the server goes away.
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const SHUTDOWN_REASON: &str = "server shutdown";

pub struct ClientState {
    pub id: ClientId,
    pub tx: mpsc::Sender<Message>,
    pub connected_at: DateTime<Utc>,
    dropped: AtomicU64,
    send_order: Mutex<()>,
}

impl ClientState {
    pub fn new(tx: mpsc::Sender<Message>, connected_at: DateTime<Utc>) -> Self {
        Self {
            id: ClientId::new(),
            tx,
            connected_at,
            dropped: AtomicU64::new(0),
            send_order: Mutex::new(()),
        }
    }

    /// Holds back broadcasts to this client until the guard drops.
    pub fn lock_sends(&self) -> MutexGuard<'_, ()> {
        self.send_order.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn send(&self, envelope: &Envelope) -> Result<()> {
        let json = envelope.to_json()?;
        if self.try_send_raw(Message::Text(json.into())) {
            Ok(())
        } else {
            Err(GatewayError::ChannelSend)
        }
    }

    /// Returns false when the queue is full or the writer is gone.
    pub fn try_send_raw(&self, msg: Message) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Queues a close frame; the writer stops after sending it.
    pub fn close(&self, code: u16, reason: &'static str) -> bool {
        self.try_send_raw(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
    }

    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<ClientId, Arc<ClientState>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client: Arc<ClientState>) -> ClientId {
        let id = client.id;
        self.clients.insert(id, client);
        info!("Client {} registered", id);
        id
    }

    pub fn unregister(&self, client_id: &ClientId) {
        if let Some((_, client)) = self.clients.remove(client_id) {
            let dropped = client.dropped_messages();
            if dropped > 0 {
                warn!("Client {} unregistered after dropping {} messages", client_id, dropped);
            } else {
                info!("Client {} unregistered", client_id);
            }
        }
    }

    pub fn get(&self, client_id: &ClientId) -> Option<Arc<ClientState>> {
        self.clients.get(client_id).map(|entry| entry.clone())
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Sends one pre-serialized envelope to the given clients. Returns how many accepted it.
    pub fn send_to(&self, client_ids: &[ClientId], envelope: &Envelope) -> usize {
        if client_ids.is_empty() {
            return 0;
        }
        let json = match envelope.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize broadcast message: {}", e);
                return 0;
            }
        };

        client_ids
            .iter()
            .filter_map(|id| self.get(id))
            .filter(|client| {
                let _order = client.lock_sends();
                let sent = client.try_send_raw(Message::Text(json.clone().into()));
                if !sent {
                    debug!("Failed to send to client {}", client.id);
                }
                sent
            })
            .count()
    }

    pub fn broadcast_all(&self, envelope: &Envelope) -> usize {
        let ids: Vec<ClientId> = self.clients.iter().map(|entry| *entry.key()).collect();
        self.send_to(&ids, envelope)
    }

    /// Queues a `shutdown` notice followed by a going-away close frame for every client.
    pub fn shutdown_all(&self, envelope: &Envelope) {
        let notified = self.broadcast_all(envelope);
        for entry in self.clients.iter() {
            if !entry.close(CLOSE_GOING_AWAY, SHUTDOWN_REASON) {
                debug!("Could not queue close frame for client {}", entry.id);
            }
        }
        info!(
            clients = self.client_count(),
            notified, "Shutdown notice queued for connected clients"
        );
    }
}
