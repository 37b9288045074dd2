pub mod broadcast;
pub mod client;
pub mod error;
pub mod protocol;
pub mod subscription;
pub mod ws;

use std::sync::Arc;
use tokio::sync::watch;

use crate::utils::time::Clock;

pub use broadcast::{BroadcastEvent, Broadcaster, Dispatcher};
pub use client::{ClientRegistry, ClientState};
pub use error::GatewayError;
pub use protocol::{ClientMessage, DriverStatusEvent, Envelope, MessageType};
pub use subscription::{Bounds, SubscriptionRegistry};

/// Connection-side state shared by every socket task.
pub struct Gateway {
    pub clients: Arc<ClientRegistry>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    clock: Arc<dyn Clock>,
    shutdown: watch::Sender<bool>,
}

impl Gateway {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            clients: Arc::new(ClientRegistry::new()),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            clock,
            shutdown,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            clients: self.clients.clone(),
            subscriptions: self.subscriptions.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Notifies every observer, queues a going-away close and stops socket loops.
    pub fn shutdown(&self) {
        self.clients
            .shutdown_all(&Envelope::shutdown(self.clock.now()));
        self.shutdown.send_replace(true);
    }
}
