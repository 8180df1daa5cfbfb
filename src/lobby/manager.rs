//! Room manager: codes, join/leave, sessions, reconnect grace
//!
//! All room and session bookkeeping lives behind one `RwLock`. The lock
//! ordering rule for the whole server: the manager lock may be taken before
//! an engine's state lock, never while holding one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::game::constants::spawn;
use crate::game::engine::spawn_engine;
use crate::game::game_loop::Winner;
use crate::game::state::{Role, TankColor};
use crate::game::tile_map::StageParseError;
use crate::lobby::room::{LobbySlot, OutboundSender, Room, RoomStatus};
use crate::metrics::Metrics;
use crate::net::protocol::{now_ms, ErrorKind, PlayerInput, ServerEvent};

/// The manager as shared by the transport and the engine tasks
pub type SharedRoomManager = Arc<RwLock<RoomManager>>;

const ROOM_CODE_LEN: usize = 6;
const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Manager errors
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Too many rooms")]
    TooManyRooms,
    #[error("Connection is already in a room")]
    AlreadyInRoom,
    #[error("Connection is not in a room")]
    NotInRoom,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Room is not playing")]
    NotPlaying,
    #[error("Stage error: {0}")]
    Stage(#[from] StageParseError),
}

impl ManagerError {
    /// Wire-level error kind for `room_error` / `reconnect_failed`
    pub fn wire_kind(&self) -> ErrorKind {
        match self {
            ManagerError::RoomNotFound => ErrorKind::RoomNotFound,
            // An expired or unknown session reads as a missing room
            ManagerError::SessionNotFound => ErrorKind::RoomNotFound,
            ManagerError::RoomFull => ErrorKind::RoomFull,
            ManagerError::AlreadyInRoom | ManagerError::NotInRoom | ManagerError::NotPlaying => {
                ErrorKind::Unauthorized
            }
            ManagerError::TooManyRooms | ManagerError::Stage(_) => ErrorKind::ServerError,
        }
    }
}

/// Room and session registry
pub struct RoomManager {
    rooms: HashMap<String, Room>,
    /// session id -> (room id, role)
    sessions: HashMap<String, (String, Role)>,
    /// socket id -> (room id, role)
    conns: HashMap<u64, (String, Role)>,
    reconnect_timeout: Duration,
    broadcast_interval: Duration,
    max_rooms: usize,
    metrics: Arc<Metrics>,
}

impl RoomManager {
    pub fn new(config: ServerConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            rooms: HashMap::new(),
            sessions: HashMap::new(),
            conns: HashMap::new(),
            reconnect_timeout: Duration::from_millis(config.reconnect_timeout_ms),
            broadcast_interval: Duration::from_millis(config.broadcast_interval_ms),
            max_rooms: config.max_rooms,
            metrics,
        }
    }

    /// Create a room with this connection as host.
    /// Returns `(room_id, session_id)`.
    pub fn create_room(
        &mut self,
        conn_id: u64,
        sender: OutboundSender,
    ) -> Result<(String, String), ManagerError> {
        if self.conns.contains_key(&conn_id) {
            return Err(ManagerError::AlreadyInRoom);
        }
        if self.rooms.len() >= self.max_rooms {
            return Err(ManagerError::TooManyRooms);
        }

        let room_id = self.generate_room_code();
        let session_id = Uuid::new_v4().to_string();

        let room = Room::new(room_id.clone(), LobbySlot::new(conn_id, session_id.clone()));
        room.channels.bind(Role::Host, sender);
        self.rooms.insert(room_id.clone(), room);
        self.sessions
            .insert(session_id.clone(), (room_id.clone(), Role::Host));
        self.conns.insert(conn_id, (room_id.clone(), Role::Host));

        self.metrics
            .rooms_created_total
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.update_gauges();

        info!("Room {room_id} created by connection {conn_id}");
        Ok((room_id, session_id))
    }

    /// Join a room as guest; the second arrival starts the engine.
    /// Returns the guest's session id.
    pub fn join_room(
        &mut self,
        conn_id: u64,
        sender: OutboundSender,
        room_id: &str,
        shared: &SharedRoomManager,
    ) -> Result<String, ManagerError> {
        if self.conns.contains_key(&conn_id) {
            return Err(ManagerError::AlreadyInRoom);
        }

        let room_id = room_id.to_uppercase();
        let broadcast_interval = self.broadcast_interval;
        let metrics = self.metrics.clone();

        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(ManagerError::RoomNotFound)?;
        if room.is_full() || room.status != RoomStatus::Waiting {
            return Err(ManagerError::RoomFull);
        }

        let session_id = Uuid::new_v4().to_string();
        room.guest = Some(LobbySlot::new(conn_id, session_id.clone()));
        room.channels.bind(Role::Guest, sender);

        room.channels
            .send(Role::Host, ServerEvent::PlayerJoined { role: Role::Guest });

        // Two players present: the room goes live
        let engine = spawn_engine(
            &room.id,
            room.channels.clone(),
            shared.clone(),
            metrics,
            broadcast_interval,
        )?;
        let seed = engine.seed;
        let map_id = engine.map_id;
        room.engine = Some(engine);
        room.status = RoomStatus::Playing;
        room.started_at = Some(std::time::Instant::now());

        let timestamp = now_ms();
        room.channels
            .broadcast(&ServerEvent::GameStart { timestamp });
        room.channels.broadcast(&ServerEvent::GameStateInit {
            seed,
            map_id,
            host_position: spawn::HOST.into(),
            guest_position: spawn::GUEST.into(),
            host_tank_color: TankColor::Yellow,
            guest_tank_color: TankColor::Green,
            timestamp,
        });

        self.sessions
            .insert(session_id.clone(), (room_id.clone(), Role::Guest));
        self.conns.insert(conn_id, (room_id.clone(), Role::Guest));
        self.update_gauges();

        info!("Room {room_id} is playing");
        Ok(session_id)
    }

    /// Explicit leave: the peer is notified and the room is freed
    pub fn leave_room(&mut self, conn_id: u64) -> Result<(), ManagerError> {
        let (room_id, role) = self
            .conns
            .get(&conn_id)
            .cloned()
            .ok_or(ManagerError::NotInRoom)?;

        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.channels.send(role.peer(), ServerEvent::PlayerLeft);
            room.stop_engine();
            room.status = RoomStatus::Finished;
        }
        self.remove_room(&room_id);

        info!("Connection {conn_id} left room {room_id}");
        Ok(())
    }

    /// Socket dropped: keep the slot and session, start the grace timer
    pub fn handle_disconnect(&mut self, conn_id: u64, shared: &SharedRoomManager) {
        let Some((room_id, role)) = self.conns.remove(&conn_id) else {
            self.update_gauges();
            return;
        };
        let reconnect_timeout = self.reconnect_timeout;

        let Some(room) = self.rooms.get_mut(&room_id) else {
            self.update_gauges();
            return;
        };

        room.channels.unbind(role);
        if let Some(engine) = &room.engine {
            engine.inputs.clear(role);
        }
        room.channels
            .send(role.peer(), ServerEvent::OpponentDisconnected);

        let Some(slot) = room.slot_mut(role) else {
            self.update_gauges();
            return;
        };
        slot.connected = false;
        slot.conn_id = None;
        slot.cancel_grace_timer();

        let session_id = slot.session_id.clone();
        let timer_shared = shared.clone();
        let timer_room = room_id.clone();
        slot.grace_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(reconnect_timeout).await;
            timer_shared
                .write()
                .await
                .expire_slot(&timer_room, role, &session_id);
        }));

        self.update_gauges();
        info!("Connection {conn_id} disconnected from room {room_id}; grace window open");
    }

    /// Grace window ran out: drop the slot, stop the engine, notify the peer
    pub fn expire_slot(&mut self, room_id: &str, role: Role, session_id: &str) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        let matches = room
            .slot(role)
            .is_some_and(|s| s.session_id == session_id && !s.connected);
        if !matches {
            return;
        }

        if let Some(mut slot) = room.take_slot(role) {
            // This runs inside the timer task itself; detach the handle so
            // dropping the slot does not abort the running task.
            slot.grace_timer.take();
        }
        self.sessions.remove(session_id);

        room.channels.send(role.peer(), ServerEvent::PlayerLeft);
        room.stop_engine();
        room.status = RoomStatus::Finished;

        let empty = room.is_empty();
        warn!("Session {session_id} expired; slot {role:?} removed from room {room_id}");
        if empty {
            self.remove_room(room_id);
        }
        self.update_gauges();
    }

    /// Rebind a new socket to the slot a session id belongs to.
    /// Returns `(room_id, role)` on success.
    pub fn reconnect(
        &mut self,
        conn_id: u64,
        sender: OutboundSender,
        session_id: &str,
    ) -> Result<(String, Role), ManagerError> {
        if self.conns.contains_key(&conn_id) {
            return Err(ManagerError::AlreadyInRoom);
        }

        let (room_id, role) = self
            .sessions
            .get(session_id)
            .cloned()
            .ok_or(ManagerError::SessionNotFound)?;

        let Some(room) = self.rooms.get_mut(&room_id) else {
            self.sessions.remove(session_id);
            return Err(ManagerError::SessionNotFound);
        };
        if room.status == RoomStatus::Finished {
            return Err(ManagerError::SessionNotFound);
        }

        let Some(slot) = room.slot_mut(role) else {
            self.sessions.remove(session_id);
            return Err(ManagerError::SessionNotFound);
        };

        slot.cancel_grace_timer();
        slot.conn_id = Some(conn_id);
        slot.connected = true;

        room.channels.bind(role, sender);
        room.channels
            .send(role.peer(), ServerEvent::OpponentReconnected);

        self.conns.insert(conn_id, (room_id.clone(), role));
        self.update_gauges();

        info!("Session {session_id} reconnected to room {room_id} as {role:?}");
        Ok((room_id, role))
    }

    /// Feed a `player_input` into the slot's latest-input cell
    pub fn route_input(&self, conn_id: u64, input: PlayerInput) -> Result<(), ManagerError> {
        let (room_id, role) = self.conns.get(&conn_id).ok_or(ManagerError::NotInRoom)?;
        let room = self.rooms.get(room_id).ok_or(ManagerError::NotInRoom)?;
        let engine = room.engine.as_ref().ok_or(ManagerError::NotPlaying)?;
        engine.inputs.store(*role, input);
        Ok(())
    }

    /// Client-reported end of game: accept only from a member of a playing
    /// room, then finish that room with the reported verdict.
    pub fn handle_client_game_over(
        &mut self,
        conn_id: u64,
        winner: Winner,
        reason: String,
    ) -> Result<(), ManagerError> {
        let (room_id, _) = self
            .conns
            .get(&conn_id)
            .cloned()
            .ok_or(ManagerError::NotInRoom)?;
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(ManagerError::NotInRoom)?;
        if room.status != RoomStatus::Playing {
            return Err(ManagerError::NotPlaying);
        }

        room.channels.broadcast(&ServerEvent::GameOver {
            winner,
            reason,
            timestamp: now_ms(),
        });
        room.stop_engine();
        room.status = RoomStatus::Finished;
        info!("Room {room_id} finished on client report");
        Ok(())
    }

    /// Mark a room finished and stop its engine (idempotent; missing room ok)
    pub fn finish_room(&mut self, room_id: &str) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.stop_engine();
            room.status = RoomStatus::Finished;
        }
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connected_player_count(&self) -> usize {
        self.conns.len()
    }

    fn generate_room_code(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code: String = (0..ROOM_CODE_LEN)
                .map(|_| {
                    let i = rng.gen_range(0..ROOM_CODE_CHARSET.len());
                    ROOM_CODE_CHARSET[i] as char
                })
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    fn remove_room(&mut self, room_id: &str) {
        if let Some(room) = self.rooms.remove(room_id) {
            for role in [Role::Host, Role::Guest] {
                if let Some(slot) = room.slot(role) {
                    self.sessions.remove(&slot.session_id);
                    if let Some(conn) = slot.conn_id {
                        self.conns.remove(&conn);
                    }
                }
            }
        }
        self.update_gauges();
    }

    fn update_gauges(&self) {
        use std::sync::atomic::Ordering;
        self.metrics
            .rooms_active
            .store(self.rooms.len() as u64, Ordering::Relaxed);
        self.metrics
            .players_connected
            .store(self.conns.len() as u64, Ordering::Relaxed);
    }
}
