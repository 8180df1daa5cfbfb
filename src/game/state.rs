//! Core simulation state: tanks, bullets, player slots

use serde::{Deserialize, Serialize};

use crate::game::constants::{field, spawn, speed, timing};
use crate::game::systems::spawner::{Lcg, QueuedBot};
use crate::game::tile_map::TileMap;
use crate::util::rect::Rect;

/// Facing / travel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit step along this direction (screen coordinates, y grows downward)
    #[inline]
    pub fn step(self) -> (f64, f64) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }

    #[inline]
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    /// True for a horizontal/vertical axis change (90-degree turn)
    #[inline]
    pub fn is_perpendicular_to(self, other: Direction) -> bool {
        self.is_horizontal() != other.is_horizontal()
    }
}

/// Which side controls a tank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TankSide {
    Player,
    Bot,
}

/// Tank capability tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TankLevel {
    Basic,
    Fast,
    Power,
    Armor,
}

/// Sprite color; doubles as the slot identity for player tanks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TankColor {
    Yellow,
    Green,
    Silver,
    Red,
}

/// The two player slots of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    pub fn peer(self) -> Role {
        match self {
            Role::Host => Role::Guest,
            Role::Guest => Role::Host,
        }
    }

    /// Player tank color bound to this slot
    pub fn tank_color(self) -> TankColor {
        match self {
            Role::Host => TankColor::Yellow,
            Role::Guest => TankColor::Green,
        }
    }

    pub fn spawn_position(self) -> (f64, f64) {
        match self {
            Role::Host => spawn::HOST,
            Role::Guest => spawn::GUEST,
        }
    }
}

/// One tank in the simulation
#[derive(Debug, Clone)]
pub struct Tank {
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
    /// Invincibility countdown, ms
    pub helmet_ms: f64,
    /// Immobility countdown, ms
    pub frozen_ms: f64,
    /// Fire-gate countdown, ms
    pub cooldown_ms: f64,
    pub with_power_up: bool,
}

impl Tank {
    /// Fresh player tank at the slot spawn, facing up, with spawn invincibility
    pub fn player(id: u32, role: Role) -> Self {
        let (x, y) = role.spawn_position();
        Self {
            id,
            x,
            y,
            direction: Direction::Up,
            moving: false,
            alive: true,
            side: TankSide::Player,
            level: TankLevel::Basic,
            color: role.tank_color(),
            hp: 1,
            helmet_ms: timing::SPAWN_HELMET_MS,
            frozen_ms: 0.0,
            cooldown_ms: 0.0,
            with_power_up: false,
        }
    }

    /// Fresh bot tank entering at a spawn point, facing down
    pub fn bot(id: u32, queued: QueuedBot, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            direction: Direction::Down,
            moving: true,
            alive: true,
            side: TankSide::Bot,
            level: queued.level,
            color: if queued.with_power_up {
                TankColor::Red
            } else {
                TankColor::Silver
            },
            hp: if queued.level == TankLevel::Armor { 4 } else { 1 },
            helmet_ms: 0.0,
            frozen_ms: 0.0,
            cooldown_ms: 0.0,
            with_power_up: queued.with_power_up,
        }
    }

    /// Movement speed in units/ms for this tank
    pub fn speed(&self) -> f64 {
        match self.side {
            TankSide::Player => speed::PLAYER,
            TankSide::Bot => match self.level {
                TankLevel::Basic | TankLevel::Armor => speed::BOT_BASIC,
                TankLevel::Fast => speed::BOT_FAST,
                TankLevel::Power => speed::BOT_POWER,
            },
        }
    }

    /// Power of bullets fired by this tank
    pub fn bullet_power(&self) -> u8 {
        match (self.side, self.level) {
            (TankSide::Bot, TankLevel::Power) => 2,
            _ => 1,
        }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::square(self.x, self.y, field::TANK_SIZE)
    }
}

/// One bullet in flight
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    /// Units per millisecond
    pub speed: f64,
    /// Owning tank; resolved by id, never by reference
    pub tank_id: u32,
    /// 1-4; >= 3 destroys steel
    pub power: u8,
}

impl Bullet {
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::square(self.x, self.y, field::BULLET_SIZE)
    }
}

/// Engine verdict for a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Playing,
    Won,
    Lost,
}

/// Per-slot progress tracked by the engine
#[derive(Debug, Clone)]
pub struct PlayerSlotState {
    pub lives: u32,
    pub score: u32,
    pub active_tank_id: Option<u32>,
}

impl PlayerSlotState {
    pub fn new() -> Self {
        Self {
            lives: spawn::PLAYER_LIVES,
            score: 0,
            active_tank_id: None,
        }
    }
}

impl Default for PlayerSlotState {
    fn default() -> Self {
        Self::new()
    }
}

/// Full simulation state of one room. Mutated only by the room's tick task.
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u64,
    pub status: GameStatus,
    pub tanks: Vec<Tank>,
    pub bullets: Vec<Bullet>,
    pub map: TileMap,
    pub host: PlayerSlotState,
    pub guest: PlayerSlotState,
    pub bot_queue: Vec<QueuedBot>,
    pub bots_spawned: usize,
    pub spawn_point_cursor: usize,
    /// Countdown until the next scheduled bot spawn, ms
    pub spawn_timer_ms: f64,
    pub rng: Lcg,
    next_tank_id: u32,
    next_bullet_id: u32,
    /// Cells destroyed since the last `map_changes` drain
    pub pending_bricks_destroyed: Vec<u32>,
    pub pending_steels_destroyed: Vec<u32>,
}

impl GameState {
    pub fn new(map: TileMap, bot_queue: Vec<QueuedBot>, rng: Lcg) -> Self {
        Self {
            tick: 0,
            status: GameStatus::Playing,
            tanks: Vec::new(),
            bullets: Vec::new(),
            map,
            host: PlayerSlotState::new(),
            guest: PlayerSlotState::new(),
            bot_queue,
            bots_spawned: 0,
            spawn_point_cursor: 0,
            spawn_timer_ms: 0.0,
            rng,
            next_tank_id: 1,
            next_bullet_id: 1,
            pending_bricks_destroyed: Vec::new(),
            pending_steels_destroyed: Vec::new(),
        }
    }

    pub fn alloc_tank_id(&mut self) -> u32 {
        let id = self.next_tank_id;
        self.next_tank_id += 1;
        id
    }

    pub fn alloc_bullet_id(&mut self) -> u32 {
        let id = self.next_bullet_id;
        self.next_bullet_id += 1;
        id
    }

    pub fn tank(&self, id: u32) -> Option<&Tank> {
        self.tanks.iter().find(|t| t.id == id)
    }

    pub fn tank_mut(&mut self, id: u32) -> Option<&mut Tank> {
        self.tanks.iter_mut().find(|t| t.id == id)
    }

    pub fn slot(&self, role: Role) -> &PlayerSlotState {
        match role {
            Role::Host => &self.host,
            Role::Guest => &self.guest,
        }
    }

    pub fn slot_mut(&mut self, role: Role) -> &mut PlayerSlotState {
        match role {
            Role::Host => &mut self.host,
            Role::Guest => &mut self.guest,
        }
    }

    /// Role owning a tank, if it is one of the slots' active tanks
    pub fn role_of_tank(&self, tank_id: u32) -> Option<Role> {
        if self.host.active_tank_id == Some(tank_id) {
            Some(Role::Host)
        } else if self.guest.active_tank_id == Some(tank_id) {
            Some(Role::Guest)
        } else {
            None
        }
    }

    /// Bots not yet spawned
    pub fn remaining_bots(&self) -> usize {
        self.bot_queue.len() - self.bots_spawned
    }

    pub fn alive_bot_count(&self) -> usize {
        self.tanks
            .iter()
            .filter(|t| t.side == TankSide::Bot && t.alive)
            .count()
    }
}
