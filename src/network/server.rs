//! WebSocket Store Gateway
//!
//! Exposes the [`SessionStore`] contract to remote clients. Each connection
//! identifies itself with `hello`; mutations before that are rejected, and
//! writes to a session are only accepted from its owner.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use serde::{Serialize, Deserialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::store::{CreateOutcome, OwnerId, SessionStore, StoreError};

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Server version string.
    pub version: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            version: crate::VERSION.to_string(),
        }
    }
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Bound owner (after hello).
    owner: Option<OwnerId>,
    /// Connection time.
    connected_at: Instant,
}

/// The gateway server.
pub struct GatewayServer<S> {
    config: GatewayConfig,
    store: Arc<S>,
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<S: SessionStore + 'static> GatewayServer<S> {
    /// Create a gateway in front of `store`.
    pub fn new(config: GatewayConfig, store: Arc<S>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            store,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        info!("Gateway listening on {}", listener.local_addr()?);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connection_count().await >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let store = self.store.clone();
        let version = self.config.version.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            clients.write().await.insert(addr, ConnectedClient {
                owner: None,
                connected_at: Instant::now(),
            });

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut principal: Option<OwnerId> = None;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let reply = match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        let reply = dispatch(store.as_ref(), &mut principal, &version, client_msg).await;
                                        if let ServerMessage::Welcome { .. } = reply {
                                            if let Some(client) = clients.write().await.get_mut(&addr) {
                                                client.owner = principal.clone();
                                            }
                                        }
                                        reply
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        ServerMessage::error(ErrorCode::InvalidInput, "Invalid message format")
                                    }
                                };
                                if msg_tx.send(reply).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Let queued replies flush before the socket drops
            drop(msg_tx);
            let _ = sender_task.await;

            if let Some(client) = clients.write().await.remove(&addr) {
                debug!(
                    "Removed client {} ({:?}) after {:?}",
                    addr,
                    client.owner,
                    client.connected_at.elapsed()
                );
            }
        });
    }

    /// Signal all loops to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// Handle one client message against the store.
///
/// `principal` is the connection's bound owner; `hello` sets it.
pub async fn dispatch<S: SessionStore>(
    store: &S,
    principal: &mut Option<OwnerId>,
    version: &str,
    msg: ClientMessage,
) -> ServerMessage {
    let op = msg.op();

    if msg.is_mutation() && principal.is_none() {
        return ServerMessage::error(ErrorCode::NotAuthenticated, "Send hello before writing");
    }

    let result = match msg {
        ClientMessage::Hello { owner } => {
            if owner.trim().is_empty() {
                return ServerMessage::error(ErrorCode::InvalidInput, "Owner must not be empty");
            }
            let owner = OwnerId::new(owner);
            *principal = Some(owner.clone());
            Ok(ServerMessage::Welcome {
                version: version.to_string(),
                owner: owner.0,
            })
        }
        ClientMessage::StartSession { session_id, config } => store
            .create_session(&session_id, principal.as_ref(), config)
            .await
            .map(|outcome| ack(op, outcome == CreateOutcome::Created)),
        ClientMessage::UpdateStage { session_id, stage } => {
            match check_owner(store, principal.as_ref(), &session_id).await {
                Ok(()) => store.update_session_stage(&session_id, stage).await.map(|()| ack(op, true)),
                Err(reply) => return reply,
            }
        }
        ClientMessage::EndSession { session_id, final_score } => {
            match check_owner(store, principal.as_ref(), &session_id).await {
                Ok(()) => store.end_session(&session_id, final_score).await.map(|()| ack(op, true)),
                Err(reply) => return reply,
            }
        }
        ClientMessage::LogEvent { event } => {
            match check_owner(store, principal.as_ref(), &event.session_id).await {
                Ok(()) => store.append_event(event).await.map(|stored| ack(op, stored)),
                Err(reply) => return reply,
            }
        }
        ClientMessage::GetSession { session_id } => store
            .get_session(&session_id)
            .await
            .map(|session| ServerMessage::Session { session }),
        ClientMessage::EventsSince { session_id, after_idx, limit } => store
            .list_events_since(&session_id, after_idx, limit)
            .await
            .map(|events| {
                let watermark = events.last().map(|e| e.idx).unwrap_or(after_idx);
                ServerMessage::Events { session_id, events, watermark }
            }),
        ClientMessage::ListActiveSessions => store
            .list_active_sessions()
            .await
            .map(|sessions| ServerMessage::Sessions { sessions }),
        ClientMessage::TopScores => store
            .top_scores()
            .await
            .map(|sessions| ServerMessage::Sessions { sessions }),
        ClientMessage::WatchUser { owner } => store
            .latest_active_session_for(&OwnerId::new(owner))
            .await
            .map(|session| ServerMessage::Session { session }),
        ClientMessage::Ping { timestamp } => Ok(ServerMessage::Pong {
            timestamp,
            server_time: chrono::Utc::now().timestamp_millis(),
        }),
    };

    result.unwrap_or_else(|e| {
        warn!("{} failed: {}", op, e);
        match e {
            StoreError::Unauthenticated => ServerMessage::error(ErrorCode::NotAuthenticated, e.to_string()),
            StoreError::Unavailable(_) => ServerMessage::error(ErrorCode::Unavailable, e.to_string()),
        }
    })
}

fn ack(op: &str, applied: bool) -> ServerMessage {
    ServerMessage::Ack {
        op: op.to_string(),
        applied,
    }
}

/// Writes to an existing session must come from its owner. Missing
/// sessions pass through; the store treats them as no-ops.
async fn check_owner<S: SessionStore>(
    store: &S,
    principal: Option<&OwnerId>,
    session_id: &str,
) -> Result<(), ServerMessage> {
    match store.get_session(session_id).await {
        Ok(Some(record)) if Some(&record.owner) != principal => Err(ServerMessage::error(
            ErrorCode::NotOwner,
            format!("Session {} belongs to another owner", session_id),
        )),
        Ok(_) => Ok(()),
        Err(e) => Err(ServerMessage::error(ErrorCode::Unavailable, e.to_string())),
    }
}
