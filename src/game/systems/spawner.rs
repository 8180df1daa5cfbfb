//! Bot spawn queue and schedule
//!
//! Every room draws the same 20-bot queue: 18 basic, 1 fast, 1 power,
//! shuffled with an LCG seeded from the room id so both a replay and a
//! reconnecting client observe the identical sequence.

use crate::game::constants::spawn;
use crate::game::state::{GameState, Tank, TankLevel};

/// Multiplicative LCG over the ring mod 233280
///
/// `s <- (s * 9301 + 49297) mod 233280`
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub const MODULUS: u64 = 233280;

    pub fn new(seed: u32) -> Self {
        Self {
            state: seed as u64 % Self::MODULUS,
        }
    }

    /// Next raw value in `0..233280`
    pub fn next(&mut self) -> u64 {
        self.state = (self.state * 9301 + 49297) % Self::MODULUS;
        self.state
    }

    /// Next value in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        self.next() as f64 / Self::MODULUS as f64
    }

    /// Uniform index in `0..n`
    pub fn pick(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        ((self.next_f64() * n as f64) as usize).min(n - 1)
    }

    /// Bernoulli draw
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Deterministic seed derived from the room id
pub fn seed_from_room_id(room_id: &str) -> u32 {
    room_id
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
}

/// One queued bot, fixed at engine start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedBot {
    pub level: TankLevel,
    pub with_power_up: bool,
}

/// Build the per-room bot queue: 18 basic + 1 fast + 1 power, seeded shuffle,
/// power-up markers on the 4th, 11th and 18th spawn.
pub fn build_bot_queue(rng: &mut Lcg) -> Vec<QueuedBot> {
    let mut levels = vec![TankLevel::Basic; spawn::BOT_TOTAL];
    levels[spawn::BOT_TOTAL - 2] = TankLevel::Fast;
    levels[spawn::BOT_TOTAL - 1] = TankLevel::Power;

    // Fisher-Yates driven by the room LCG
    for i in (1..levels.len()).rev() {
        let j = rng.pick(i + 1);
        levels.swap(i, j);
    }

    levels
        .into_iter()
        .enumerate()
        .map(|(index, level)| QueuedBot {
            level,
            with_power_up: spawn::POWER_UP_INDICES.contains(&index),
        })
        .collect()
}

/// Spawn the next queued bot at the cycling spawn point.
///
/// Returns the new tank id, or None when the queue is drained.
pub fn spawn_next_bot(state: &mut GameState) -> Option<u32> {
    if state.bots_spawned >= state.bot_queue.len() {
        return None;
    }

    let queued = state.bot_queue[state.bots_spawned];
    let (x, y) = spawn::BOT_CYCLE[state.spawn_point_cursor % spawn::BOT_CYCLE.len()];
    state.spawn_point_cursor += 1;
    state.bots_spawned += 1;

    let id = state.alloc_tank_id();
    state.tanks.push(Tank::bot(id, queued, x, y));
    Some(id)
}

/// Advance the spawn timer; one bot every interval until the queue drains
pub fn run_spawn_schedule(state: &mut GameState, delta_ms: f64) -> Vec<u32> {
    let mut spawned = Vec::new();
    if state.remaining_bots() == 0 {
        return spawned;
    }

    state.spawn_timer_ms -= delta_ms;
    while state.spawn_timer_ms <= 0.0 {
        match spawn_next_bot(state) {
            Some(id) => spawned.push(id),
            None => {
                state.spawn_timer_ms = 0.0;
                break;
            }
        }
        state.spawn_timer_ms += spawn::BOT_SPAWN_INTERVAL_MS;
    }
    spawned
}
