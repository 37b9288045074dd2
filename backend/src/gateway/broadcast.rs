//! Decouples ingestion from fan-out: producers enqueue, one dispatcher task
//! resolves subscribers and pushes pre-serialized frames.

use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use crate::{
    gateway::{
        client::ClientRegistry,
        protocol::{DriverStatusEvent, Envelope},
        subscription::SubscriptionRegistry,
    },
    models::LiveBus,
    utils::time::Clock,
};

#[derive(Debug, Clone)]
pub enum BroadcastEvent {
    Location(LiveBus),
    DriverStatus(DriverStatusEvent),
}

#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: mpsc::UnboundedSender<BroadcastEvent>,
}

impl Broadcaster {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BroadcastEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Never blocks. Returns false once the dispatcher has stopped.
    pub fn publish(&self, event: BroadcastEvent) -> bool {
        if self.tx.send(event).is_err() {
            debug!("Broadcast dispatcher is gone; event dropped");
            return false;
        }
        true
    }
}

pub struct Dispatcher {
    pub clients: Arc<ClientRegistry>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Delivers one event and returns the number of clients that accepted it.
    pub fn dispatch(&self, event: &BroadcastEvent) -> usize {
        let now = self.clock.now();
        match event {
            BroadcastEvent::Location(bus) => {
                let targets = self
                    .subscriptions
                    .matching(bus.location.latitude, bus.location.longitude);
                self.clients
                    .send_to(&targets, &Envelope::location_update(bus, now))
            }
            BroadcastEvent::DriverStatus(status) => self
                .clients
                .broadcast_all(&Envelope::driver_status(status, now)),
        }
    }

    pub fn spawn(self, mut rx: mpsc::UnboundedReceiver<BroadcastEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let delivered = self.dispatch(&event);
                debug!(delivered, "Broadcast dispatched");
            }
            debug!("Broadcast dispatcher stopped");
        })
    }
}
