//! WebSocket transport gateway
//!
//! One connection per client, JSON text frames. The gateway owns nothing of
//! the game: it decodes events, routes them to the room manager or the
//! engine input cells, and pumps the per-connection outbound channel into
//! the socket. Slow clients lose snapshots, never the server's time.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::lobby::manager::SharedRoomManager;
use crate::lobby::room::{OutboundSender, OUTBOUND_CAPACITY};
use crate::metrics::Metrics;
use crate::net::protocol::{self, now_ms, ClientEvent, ErrorKind, ServerEvent};
use crate::net::validator::InputValidator;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// WebSocket server front-end
pub struct WebSocketServer {
    config: ServerConfig,
    manager: SharedRoomManager,
    metrics: Arc<Metrics>,
}

impl WebSocketServer {
    pub fn new(config: ServerConfig, manager: SharedRoomManager, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            manager,
            metrics,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.port)
    }

    /// Accept loop; runs until the process shuts down
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr()).await?;
        info!("WebSocket server listening on ws://{}", self.bind_addr());

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept error: {e}");
                    continue;
                }
            };

            let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
            debug!("Connection {conn_id} from {peer}");

            let manager = self.manager.clone();
            let metrics = self.metrics.clone();
            let allowed_origin = self.config.allowed_origin.clone();

            tokio::spawn(async move {
                handle_connection(stream, conn_id, allowed_origin, manager, metrics).await;
            });
        }
    }
}

/// Run one client connection to completion
async fn handle_connection(
    stream: TcpStream,
    conn_id: u64,
    allowed_origin: Option<String>,
    manager: SharedRoomManager,
    metrics: Arc<Metrics>,
) {
    let callback = |request: &Request, response: Response| {
        check_origin(request, response, allowed_origin.as_deref())
    };
    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("Handshake failed for connection {conn_id}: {e}");
            return;
        }
    };

    metrics.connections_active.fetch_add(1, Ordering::Relaxed);

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_CAPACITY);

    // Write task: outbound channel -> socket
    let write_metrics = metrics.clone();
    let write_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match protocol::encode(&event) {
                Ok(text) => {
                    if ws_write.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                    write_metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!("Failed to encode outbound event: {e}"),
            }
        }
    });

    // Read loop: socket -> manager / engine
    let mut validator = InputValidator::new();
    while let Some(frame) = ws_read.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                debug!("Socket error on connection {conn_id}: {e}");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                match protocol::decode(&text) {
                    Ok(event) => {
                        handle_event(event, conn_id, &tx, &manager, &mut validator, &metrics)
                            .await;
                    }
                    Err(e) => {
                        debug!("Bad frame from connection {conn_id}: {e}");
                        metrics.inputs_rejected_total.fetch_add(1, Ordering::Relaxed);
                        reply(
                            &tx,
                            ServerEvent::RoomError {
                                kind: ErrorKind::InvalidInput,
                                message: "Malformed event".to_string(),
                            },
                        );
                    }
                }
            }
            Message::Close(_) => break,
            // The protocol is JSON text; control frames are handled by
            // tungstenite, anything else is ignored
            _ => {}
        }
    }

    // Socket gone: grace window starts
    manager.write().await.handle_disconnect(conn_id, &manager);
    metrics.connections_active.fetch_sub(1, Ordering::Relaxed);
    drop(tx);
    let _ = write_task.await;
    debug!("Connection {conn_id} closed");
}

fn check_origin(
    request: &Request,
    response: Response,
    allowed: Option<&str>,
) -> Result<Response, ErrorResponse> {
    let Some(allowed) = allowed else {
        return Ok(response);
    };
    let origin = request
        .headers()
        .get("Origin")
        .and_then(|value| value.to_str().ok());
    if origin == Some(allowed) {
        Ok(response)
    } else {
        warn!("Rejected handshake from origin {origin:?}");
        let mut error = ErrorResponse::new(Some("Origin not allowed".to_string()));
        *error.status_mut() = StatusCode::FORBIDDEN;
        Err(error)
    }
}

/// Non-blocking reply on the connection's own channel
fn reply(tx: &OutboundSender, event: ServerEvent) {
    if tx.try_send(event).is_err() {
        debug!("Outbound buffer full; reply dropped");
    }
}

async fn handle_event(
    event: ClientEvent,
    conn_id: u64,
    tx: &OutboundSender,
    manager: &SharedRoomManager,
    validator: &mut InputValidator,
    metrics: &Arc<Metrics>,
) {
    match event {
        ClientEvent::CreateRoom => {
            let result = manager.write().await.create_room(conn_id, tx.clone());
            match result {
                Ok((room_id, session_id)) => reply(
                    tx,
                    ServerEvent::RoomCreated {
                        room_id,
                        session_id,
                        role: crate::game::state::Role::Host,
                    },
                ),
                Err(e) => reply(
                    tx,
                    ServerEvent::RoomError {
                        kind: e.wire_kind(),
                        message: e.to_string(),
                    },
                ),
            }
        }

        ClientEvent::JoinRoom { room_id } => {
            let result = manager
                .write()
                .await
                .join_room(conn_id, tx.clone(), &room_id, manager);
            match result {
                Ok(session_id) => reply(
                    tx,
                    ServerEvent::RoomJoined {
                        room_id: room_id.to_uppercase(),
                        session_id,
                        role: crate::game::state::Role::Guest,
                    },
                ),
                Err(e) => reply(
                    tx,
                    ServerEvent::RoomError {
                        kind: e.wire_kind(),
                        message: e.to_string(),
                    },
                ),
            }
        }

        ClientEvent::LeaveRoom => {
            if let Err(e) = manager.write().await.leave_room(conn_id) {
                reply(
                    tx,
                    ServerEvent::RoomError {
                        kind: e.wire_kind(),
                        message: e.to_string(),
                    },
                );
            }
        }

        ClientEvent::Reconnect { session_id } => {
            let result = manager
                .write()
                .await
                .reconnect(conn_id, tx.clone(), &session_id);
            match result {
                Ok((room_id, role)) => {
                    reply(
                        tx,
                        ServerEvent::ReconnectSuccess {
                            room_id: room_id.clone(),
                            role,
                        },
                    );
                    // Push a snapshot right away instead of waiting for the
                    // next broadcast interval
                    let snapshot = {
                        let guard = manager.read().await;
                        match guard.room(&room_id).and_then(|room| room.engine.as_ref()) {
                            Some(engine) => Some(engine.snapshot().await),
                            None => None,
                        }
                    };
                    if let Some(snapshot) = snapshot {
                        reply(tx, ServerEvent::StateSync(snapshot));
                    }
                }
                Err(e) => reply(
                    tx,
                    ServerEvent::ReconnectFailed {
                        kind: e.wire_kind(),
                        message: e.to_string(),
                    },
                ),
            }
        }

        ClientEvent::PlayerInput(input) => {
            if let Err(violation) = validator.validate(&input) {
                metrics.inputs_rejected_total.fetch_add(1, Ordering::Relaxed);
                reply(
                    tx,
                    ServerEvent::RoomError {
                        kind: ErrorKind::InvalidInput,
                        message: violation.to_string(),
                    },
                );
                return;
            }
            if let Err(e) = manager.read().await.route_input(conn_id, input) {
                reply(
                    tx,
                    ServerEvent::RoomError {
                        kind: e.wire_kind(),
                        message: e.to_string(),
                    },
                );
            }
        }

        ClientEvent::Ping { timestamp } => {
            reply(
                tx,
                ServerEvent::Pong {
                    client_timestamp: timestamp,
                    server_timestamp: now_ms(),
                },
            );
        }

        ClientEvent::GameOver { winner, reason } => {
            if let Err(e) = manager
                .write()
                .await
                .handle_client_game_over(conn_id, winner, reason)
            {
                reply(
                    tx,
                    ServerEvent::RoomError {
                        kind: e.wire_kind(),
                        message: e.to_string(),
                    },
                );
            }
        }
    }
}
