//! Reconnecting observer for the live location feed.
//!
//! One actor task owns the socket and walks
//! `Disconnected → Connecting → Connected → Reconnecting → Connecting …`.
//! Callers talk to it through an [`ObserverHandle`] and read
//! [`ObserverEvent`]s from a channel. Only one of connect, read and backoff
//! is ever in flight, and the heartbeat timer lives inside the connected
//! phase, so it is dropped on every transition.

use async_trait::async_trait;
use futures::{stream::BoxStream, Sink, SinkExt, StreamExt};
use std::{collections::BTreeMap, pin::Pin, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
};

use crate::{
    config::ObserverConfig,
    error::ClientError,
    protocol::{Bounds, ClientMessage, ServerMessage, ServerMessageType},
};

/// Close code for an orderly, intentional close.
pub const CLOSE_NORMAL: u16 = 1000;

/// How long a disconnect waits for the transport to finish its close
/// handshake before the connection is dropped outright.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting `delay` before reconnect attempt number `attempt` (1-based).
    Reconnecting { attempt: u32, delay: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    StatusChanged(ConnectionStatus),
    /// A server envelope. `generation` identifies the connection it arrived on
    /// and increases by one per successful connect.
    Message {
        generation: u64,
        message: ServerMessage,
    },
    /// Emitted once when the retry budget is exhausted, just before `Disconnected`.
    GaveUp { attempts: u32 },
}

/// Frame the observer writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutFrame {
    Text(String),
    Close,
}

/// Frame the observer reads. Transport pings and binary frames never surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InFrame {
    Text(String),
    Close(Option<u16>),
}

pub struct Connection {
    pub sink: Pin<Box<dyn Sink<OutFrame, Error = ClientError> + Send>>,
    pub stream: BoxStream<'static, Result<InFrame, ClientError>>,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Connection, ClientError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Connection, ClientError> {
        let (socket, _) = connect_async(url).await?;
        let (write, read) = socket.split();

        let sink = write.sink_map_err(ClientError::from).with(|frame: OutFrame| {
            let message = match frame {
                OutFrame::Text(text) => Message::Text(text.into()),
                OutFrame::Close => Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "client disconnect".into(),
                })),
            };
            futures::future::ready(Ok::<_, ClientError>(message))
        });

        let stream = read.filter_map(|message| {
            futures::future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(InFrame::Text(text.as_str().to_string()))),
                Ok(Message::Close(frame)) => {
                    Some(Ok(InFrame::Close(frame.map(|f| u16::from(f.code)))))
                }
                Ok(_) => None,
                Err(err) => Some(Err(ClientError::from(err))),
            })
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        })
    }
}

enum Command {
    Subscribe { area: String, bounds: Bounds },
    Unsubscribe { area: String },
    Disconnect,
}

enum SessionEnd {
    ClientDisconnect,
    ServerClosedNormally,
    Dropped(String),
}

pub struct ObserverClient {
    config: ObserverConfig,
    connector: Arc<dyn Connector>,
}

impl ObserverClient {
    pub fn new(config: ObserverConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub fn tungstenite(config: ObserverConfig) -> Self {
        Self::new(config, Arc::new(TungsteniteConnector))
    }

    /// Starts connecting immediately.
    pub fn spawn(self) -> (ObserverHandle, mpsc::UnboundedReceiver<ObserverEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let status = Arc::new(watch::channel(ConnectionStatus::Disconnected).0);

        let actor = ObserverActor {
            config: self.config,
            connector: self.connector,
            commands: command_rx,
            events: event_tx,
            status: status.clone(),
            stop: stop_rx.clone(),
            subscriptions: BTreeMap::new(),
            generation: 0,
            attempt: 0,
        };
        let task = tokio::spawn(actor.run(stop_rx));

        (
            ObserverHandle {
                commands: command_tx,
                status,
                stop: stop_tx,
                task,
            },
            event_rx,
        )
    }
}

pub struct ObserverHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ObserverHandle {
    /// Remembers the area and sends it now if connected, and again after every reconnect.
    pub fn subscribe(&self, area: impl Into<String>, bounds: Bounds) -> Result<(), ClientError> {
        self.command(Command::Subscribe {
            area: area.into(),
            bounds,
        })
    }

    pub fn unsubscribe(&self, area: impl Into<String>) -> Result<(), ClientError> {
        self.command(Command::Unsubscribe { area: area.into() })
    }

    /// Cancels any pending connect or retry and reports `Disconnected`
    /// immediately. A healthy connection is closed with 1000; one whose writes
    /// are stuck is dropped after [`CLOSE_GRACE`].
    pub fn disconnect(&self) {
        self.stop.send_replace(true);
        self.status.send_replace(ConnectionStatus::Disconnected);
        // The actor may already be gone, which is the state we want anyway.
        let _ = self.commands.send(Command::Disconnect);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn status_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Waits for the observer task to finish.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "Observer task failed");
        }
    }

    fn command(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::Network("observer is stopped".into()))
    }
}

struct ObserverActor {
    config: ObserverConfig,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ObserverEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    stop: watch::Receiver<bool>,
    subscriptions: BTreeMap<String, Bounds>,
    generation: u64,
    attempt: u32,
}

impl ObserverActor {
    /// Drives the connection until it settles, or until the caller stops it.
    /// A stop lets the current phase wind down for [`CLOSE_GRACE`], then
    /// drops whatever is still in flight, including a send stuck on a stalled link.
    async fn run(mut self, mut stop: watch::Receiver<bool>) {
        {
            let drive = self.drive();
            tokio::pin!(drive);
            tokio::select! {
                _ = &mut drive => {}
                _ = async {
                    let _ = stop.wait_for(|stopped| *stopped).await;
                } => {
                    if time::timeout(CLOSE_GRACE, &mut drive).await.is_err() {
                        tracing::debug!("Observer transport stalled, dropping it without a close handshake");
                    }
                }
            }
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    async fn drive(&mut self) {
        loop {
            self.set_status(ConnectionStatus::Connecting);
            let failure = match self.connect().await {
                None => break,
                Some(Ok(connection)) => match self.run_connection(connection).await {
                    SessionEnd::ClientDisconnect => break,
                    SessionEnd::ServerClosedNormally => {
                        tracing::info!(url = %self.config.url, "Server closed the connection normally");
                        break;
                    }
                    SessionEnd::Dropped(reason) => reason,
                },
                Some(Err(err)) => err.to_string(),
            };

            tracing::warn!(url = %self.config.url, reason = %failure, "Observer connection lost");
            if !self.wait_before_retry().await {
                break;
            }
        }
    }

    /// `None` when the caller asked to disconnect while the handshake was pending.
    async fn connect(&mut self) -> Option<Result<Connection, ClientError>> {
        let connector = self.connector.clone();
        let url = self.config.url.clone();
        let handshake = time::timeout(self.config.connect_timeout, connector.connect(&url));
        tokio::pin!(handshake);

        loop {
            tokio::select! {
                // Queued commands settle before the handshake result is used.
                biased;
                command = self.commands.recv() => match command {
                    Some(Command::Disconnect) | None => return None,
                    Some(Command::Subscribe { area, bounds }) => {
                        self.subscriptions.insert(area, bounds);
                    }
                    Some(Command::Unsubscribe { area }) => {
                        self.subscriptions.remove(&area);
                    }
                },
                result = &mut handshake => {
                    return Some(result.unwrap_or(Err(ClientError::Timeout)));
                }
            }
        }
    }

    async fn run_connection(&mut self, connection: Connection) -> SessionEnd {
        let Connection {
            mut sink,
            mut stream,
        } = connection;

        self.generation += 1;
        self.attempt = 0;
        let generation = self.generation;
        self.set_status(ConnectionStatus::Connected);

        let replay: Vec<ClientMessage> = self
            .subscriptions
            .iter()
            .map(|(area, bounds)| ClientMessage::Subscribe {
                area: area.clone(),
                bounds: *bounds,
            })
            .collect();
        for message in replay {
            if let Err(err) = send_message(&mut sink, &message).await {
                return SessionEnd::Dropped(err.to_string());
            }
        }

        let period = self.config.heartbeat_interval;
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(InFrame::Text(text))) => self.handle_text(generation, &text),
                    Some(Ok(InFrame::Close(Some(CLOSE_NORMAL)))) => {
                        return SessionEnd::ServerClosedNormally;
                    }
                    Some(Ok(InFrame::Close(code))) => {
                        return SessionEnd::Dropped(format!("closed with code {:?}", code));
                    }
                    Some(Err(err)) => return SessionEnd::Dropped(err.to_string()),
                    None => return SessionEnd::Dropped("stream ended".into()),
                },
                command = self.commands.recv() => {
                    let outcome = match command {
                        Some(Command::Subscribe { area, bounds }) => {
                            self.subscriptions.insert(area.clone(), bounds);
                            send_message(&mut sink, &ClientMessage::Subscribe { area, bounds }).await
                        }
                        Some(Command::Unsubscribe { area }) => {
                            self.subscriptions.remove(&area);
                            send_message(&mut sink, &ClientMessage::Unsubscribe { area }).await
                        }
                        Some(Command::Disconnect) | None => {
                            if let Err(err) = sink.send(OutFrame::Close).await {
                                tracing::debug!(error = %err, "Close frame not delivered");
                            }
                            return SessionEnd::ClientDisconnect;
                        }
                    };
                    if let Err(err) = outcome {
                        return SessionEnd::Dropped(err.to_string());
                    }
                }
                _ = heartbeat.tick() => {
                    if let Err(err) = send_message(&mut sink, &ClientMessage::Ping).await {
                        return SessionEnd::Dropped(err.to_string());
                    }
                }
            }
        }
    }

    /// Sleeps for the next backoff delay. `false` means stop: either the retry
    /// budget is spent or the caller disconnected meanwhile.
    async fn wait_before_retry(&mut self) -> bool {
        if self.attempt >= self.config.max_reconnect_attempts {
            tracing::warn!(attempts = self.attempt, "Giving up on reconnecting");
            self.emit(ObserverEvent::GaveUp {
                attempts: self.attempt,
            });
            return false;
        }

        let delay = self.config.backoff_delay(self.attempt);
        self.attempt += 1;
        self.set_status(ConnectionStatus::Reconnecting {
            attempt: self.attempt,
            delay,
        });

        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Disconnect) | None => return false,
                    Some(Command::Subscribe { area, bounds }) => {
                        self.subscriptions.insert(area, bounds);
                    }
                    Some(Command::Unsubscribe { area }) => {
                        self.subscriptions.remove(&area);
                    }
                },
            }
        }
    }

    fn handle_text(&self, generation: u64, text: &str) {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring malformed server message");
                return;
            }
        };
        match message.kind {
            ServerMessageType::Error => {
                tracing::debug!(message = ?message.message, "Server reported an error")
            }
            ServerMessageType::Shutdown => tracing::info!("Server announced shutdown"),
            _ => {}
        }
        self.emit(ObserverEvent::Message {
            generation,
            message,
        });
    }

    /// Once the caller has stopped the observer, only `Disconnected` may be published.
    fn set_status(&self, status: ConnectionStatus) {
        let stop = &self.stop;
        let published = self.status.send_if_modified(|current| {
            if *stop.borrow() && status != ConnectionStatus::Disconnected {
                return false;
            }
            *current = status.clone();
            true
        });
        if published {
            tracing::debug!(status = ?status, "Observer status changed");
            self.emit(ObserverEvent::StatusChanged(status));
        }
    }

    fn emit(&self, event: ObserverEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }
}

async fn send_message<S>(sink: &mut S, message: &ClientMessage) -> Result<(), ClientError>
where
    S: Sink<OutFrame, Error = ClientError> + Unpin + ?Sized,
{
    sink.send(OutFrame::Text(message.to_json()?)).await
}
