//! Game room: two slots, a status, and the running engine

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::game::engine::EngineHandle;
use crate::game::state::Role;
use crate::net::protocol::ServerEvent;

/// Hard cap: a room is exactly a host and a guest
pub const MAX_PLAYERS: usize = 2;

/// Outbound capacity per socket; snapshots beyond it are dropped, the
/// simulation never waits for a slow client
pub const OUTBOUND_CAPACITY: usize = 64;

/// Per-socket outbound sender
pub type OutboundSender = mpsc::Sender<ServerEvent>;

/// Room lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// Host present, waiting for the guest
    Waiting,
    /// Both slots bound, engine running
    Playing,
    /// Verdict reached or a player gone for good; awaiting GC
    Finished,
}

/// Lobby-side view of one player slot
#[derive(Debug)]
pub struct LobbySlot {
    pub conn_id: Option<u64>,
    pub session_id: String,
    pub connected: bool,
    pub joined_at: Instant,
    /// Pending disconnect grace timer, aborted on reconnect
    pub grace_timer: Option<JoinHandle<()>>,
}

impl LobbySlot {
    pub fn new(conn_id: u64, session_id: String) -> Self {
        Self {
            conn_id: Some(conn_id),
            session_id,
            connected: true,
            joined_at: Instant::now(),
            grace_timer: None,
        }
    }

    pub fn cancel_grace_timer(&mut self) {
        if let Some(timer) = self.grace_timer.take() {
            timer.abort();
        }
    }
}

impl Drop for LobbySlot {
    fn drop(&mut self) {
        self.cancel_grace_timer();
    }
}

/// Shared per-role outbound senders.
///
/// Both the engine tasks and the room manager write through this map; it is
/// updated in place on reconnect so a rebound socket starts receiving
/// snapshots without restarting the engine.
#[derive(Debug, Clone, Default)]
pub struct RoomChannels {
    senders: Arc<parking_lot::RwLock<HashMap<Role, OutboundSender>>>,
}

impl RoomChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, role: Role, sender: OutboundSender) {
        self.senders.write().insert(role, sender);
    }

    pub fn unbind(&self, role: Role) {
        self.senders.write().remove(&role);
    }

    /// Non-blocking send to one slot. Returns false when the event was
    /// dropped (slot unbound or its buffer full).
    pub fn send(&self, role: Role, event: ServerEvent) -> bool {
        match self.senders.read().get(&role) {
            Some(sender) => sender.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Non-blocking fan-out to both slots; returns how many sends dropped
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let senders = self.senders.read();
        let mut dropped = 0;
        for sender in senders.values() {
            if sender.try_send(event.clone()).is_err() {
                dropped += 1;
            }
        }
        dropped
    }
}

/// One game room
pub struct Room {
    pub id: String,
    pub status: RoomStatus,
    pub host: Option<LobbySlot>,
    pub guest: Option<LobbySlot>,
    pub created_at: Instant,
    pub started_at: Option<Instant>,
    pub channels: RoomChannels,
    pub engine: Option<EngineHandle>,
}

impl Room {
    pub fn new(id: String, host: LobbySlot) -> Self {
        Self {
            id,
            status: RoomStatus::Waiting,
            host: Some(host),
            guest: None,
            created_at: Instant::now(),
            started_at: None,
            channels: RoomChannels::new(),
            engine: None,
        }
    }

    pub fn slot(&self, role: Role) -> Option<&LobbySlot> {
        match role {
            Role::Host => self.host.as_ref(),
            Role::Guest => self.guest.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, role: Role) -> Option<&mut LobbySlot> {
        match role {
            Role::Host => self.host.as_mut(),
            Role::Guest => self.guest.as_mut(),
        }
    }

    pub fn take_slot(&mut self, role: Role) -> Option<LobbySlot> {
        match role {
            Role::Host => self.host.take(),
            Role::Guest => self.guest.take(),
        }
    }

    /// Both slots occupied. A disconnected slot inside its grace window
    /// still counts: its session may come back.
    pub fn is_full(&self) -> bool {
        self.host.is_some() && self.guest.is_some()
    }

    pub fn role_of_session(&self, session_id: &str) -> Option<Role> {
        for role in [Role::Host, Role::Guest] {
            if self.slot(role).is_some_and(|s| s.session_id == session_id) {
                return Some(role);
            }
        }
        None
    }

    pub fn connected_count(&self) -> usize {
        [Role::Host, Role::Guest]
            .into_iter()
            .filter(|role| self.slot(*role).is_some_and(|s| s.connected))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.guest.is_none()
    }

    /// Signal the engine tasks to wind down
    pub fn stop_engine(&mut self) {
        if let Some(engine) = &self.engine {
            engine.stop();
        }
    }
}
