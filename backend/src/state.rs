use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{
    config::Config,
    gateway::{BroadcastEvent, Broadcaster, Gateway},
    repositories::{DriverRepository, LocationStore, SessionStore},
    services::{
        audit_log::{AuditLogService, AuditLogServiceTrait},
        auth::DriverAuthenticator,
        ingest::LocationIngestionGate,
        session::SessionService,
    },
    utils::time::Clock,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub drivers: Arc<dyn DriverRepository>,
    pub sessions: Arc<SessionService>,
    pub authenticator: Arc<DriverAuthenticator>,
    pub ingest: Arc<LocationIngestionGate>,
    pub locations: Arc<LocationStore>,
    pub gateway: Arc<Gateway>,
    pub broadcaster: Broadcaster,
    pub audit_log: Arc<dyn AuditLogServiceTrait>,
}

impl AppState {
    /// Wires every component. The returned receiver feeds the broadcast dispatcher
    /// (see [`AppState::spawn_dispatcher`]).
    pub fn new(
        config: Config,
        drivers: Arc<dyn DriverRepository>,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::UnboundedReceiver<BroadcastEvent>) {
        let session_store = Arc::new(SessionStore::new());
        let locations = Arc::new(LocationStore::new(config.location_history_limit));
        let (broadcaster, events) = Broadcaster::channel();

        let sliding_ttl = config
            .session_sliding_expiry
            .then(|| config.session_ttl());
        let authenticator = DriverAuthenticator::new(
            drivers.clone(),
            session_store.clone(),
            clock.clone(),
            config.session_ttl(),
        );
        let ingest = LocationIngestionGate::new(
            drivers.clone(),
            session_store.clone(),
            locations.clone(),
            broadcaster.clone(),
            clock.clone(),
            sliding_ttl,
        );

        let state = Self {
            sessions: Arc::new(SessionService::new(session_store, clock.clone())),
            authenticator: Arc::new(authenticator),
            ingest: Arc::new(ingest),
            locations,
            gateway: Arc::new(Gateway::new(clock.clone())),
            broadcaster,
            audit_log: Arc::new(AuditLogService::default()),
            config,
            drivers,
            clock,
        };
        (state, events)
    }

    pub fn spawn_dispatcher(
        &self,
        events: mpsc::UnboundedReceiver<BroadcastEvent>,
    ) -> tokio::task::JoinHandle<()> {
        self.gateway.dispatcher().spawn(events)
    }
}
