//! Wire protocol: event-typed JSON messages
//!
//! One JSON object per WebSocket text frame, `{"event": ..., "data": ...}`.
//! Payload fields are camelCase to match the browser client.

use serde::{Deserialize, Serialize};

use crate::game::game_loop::Winner;
use crate::game::state::{
    Bullet, Direction, GameState, GameStatus, PlayerSlotState, Role, Tank, TankColor, TankLevel,
    TankSide,
};

/// Encode/decode failures
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("encode: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decode: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Machine-readable error kinds carried by `room_error` / `reconnect_failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RoomNotFound,
    RoomFull,
    InvalidInput,
    Unauthorized,
    ServerError,
}

/// The only accepted input payload type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    State,
}

/// Client intent for one slot; the newest one wins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInput {
    #[serde(rename = "type")]
    pub kind: InputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub moving: bool,
    pub firing: bool,
    pub timestamp: f64,
}

/// Position payload for `game_state_init`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Messages from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    CreateRoom,
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },
    LeaveRoom,
    #[serde(rename_all = "camelCase")]
    Reconnect { session_id: String },
    PlayerInput(PlayerInput),
    Ping { timestamp: f64 },
    /// Client-reported termination hint
    GameOver { winner: Winner, reason: String },
}

/// Messages from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_id: String,
        session_id: String,
        role: Role,
    },
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: String,
        session_id: String,
        role: Role,
    },
    RoomError {
        #[serde(rename = "type")]
        kind: ErrorKind,
        message: String,
    },
    PlayerJoined {
        role: Role,
    },
    PlayerLeft,
    GameStart {
        timestamp: u64,
    },
    #[serde(rename_all = "camelCase")]
    GameStateInit {
        seed: u32,
        map_id: u32,
        host_position: Position,
        guest_position: Position,
        host_tank_color: TankColor,
        guest_tank_color: TankColor,
        timestamp: u64,
    },
    StateSync(GameSnapshot),
    #[serde(rename_all = "camelCase")]
    MapChanges {
        bricks_destroyed: Vec<u32>,
        steels_destroyed: Vec<u32>,
    },
    #[serde(rename_all = "camelCase")]
    Pong {
        client_timestamp: f64,
        server_timestamp: u64,
    },
    OpponentDisconnected,
    OpponentReconnected,
    #[serde(rename_all = "camelCase")]
    ReconnectSuccess {
        room_id: String,
        role: Role,
    },
    ReconnectFailed {
        #[serde(rename = "type")]
        kind: ErrorKind,
        message: String,
    },
    GameOver {
        winner: Winner,
        reason: String,
        timestamp: u64,
    },
}

/// One tank as the client sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankSnapshot {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    pub moving: bool,
    pub alive: bool,
    pub side: TankSide,
    pub level: TankLevel,
    pub color: TankColor,
    pub hp: u32,
    /// Remaining invincibility, ms
    pub helmet: f64,
    /// Remaining immobility, ms
    pub frozen: f64,
    /// Remaining fire gate, ms
    pub cooldown: f64,
    pub with_power_up: bool,
}

impl TankSnapshot {
    fn from_tank(tank: &Tank) -> Self {
        Self {
            id: tank.id,
            x: tank.x,
            y: tank.y,
            direction: tank.direction,
            moving: tank.moving,
            alive: tank.alive,
            side: tank.side,
            level: tank.level,
            color: tank.color,
            hp: tank.hp,
            helmet: tank.helmet_ms,
            frozen: tank.frozen_ms,
            cooldown: tank.cooldown_ms,
            with_power_up: tank.with_power_up,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletSnapshot {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    pub speed: f64,
    pub tank_id: u32,
    pub power: u8,
}

impl BulletSnapshot {
    fn from_bullet(bullet: &Bullet) -> Self {
        Self {
            id: bullet.id,
            x: bullet.x,
            y: bullet.y,
            direction: bullet.direction,
            speed: bullet.speed,
            tank_id: bullet.tank_id,
            power: bullet.power,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSnapshot {
    pub bricks: Vec<bool>,
    pub steels: Vec<bool>,
    pub eagle_broken: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSnapshot {
    pub lives: u32,
    pub score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_tank_id: Option<u32>,
}

impl SlotSnapshot {
    fn from_slot(slot: &PlayerSlotState) -> Self {
        Self {
            lives: slot.lives,
            score: slot.score,
            active_tank_id: slot.active_tank_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayersSnapshot {
    pub host: SlotSnapshot,
    pub guest: SlotSnapshot,
}

/// Complete authoritative world state broadcast as `state_sync`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub tanks: Vec<TankSnapshot>,
    pub bullets: Vec<BulletSnapshot>,
    pub map: MapSnapshot,
    pub players: PlayersSnapshot,
    pub remaining_bots: u32,
    pub game_status: GameStatus,
    pub timestamp: u64,
}

impl GameSnapshot {
    pub fn from_state(state: &GameState, timestamp: u64) -> Self {
        Self {
            tanks: state.tanks.iter().map(TankSnapshot::from_tank).collect(),
            bullets: state
                .bullets
                .iter()
                .map(BulletSnapshot::from_bullet)
                .collect(),
            map: MapSnapshot {
                bricks: state.map.bricks().to_vec(),
                steels: state.map.steels().to_vec(),
                eagle_broken: state.map.is_eagle_broken(),
            },
            players: PlayersSnapshot {
                host: SlotSnapshot::from_slot(&state.host),
                guest: SlotSnapshot::from_slot(&state.guest),
            },
            remaining_bots: state.remaining_bots() as u32,
            game_status: state.status,
            timestamp,
        }
    }
}

/// Serialize a server event to one text frame
pub fn encode(event: &ServerEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

/// Parse one inbound text frame
pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

/// Wall clock in milliseconds since the epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
