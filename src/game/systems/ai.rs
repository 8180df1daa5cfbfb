//! Per-tick bot decisions
//!
//! Bots have no routine of their own; the tick body asks this module for a
//! decision per alive bot and applies it with the same motion and fire rules
//! players get. All randomness comes from the room LCG, so a replay with the
//! same room id and input stream reproduces every bot move.

use crate::game::state::Direction;
use crate::game::systems::spawner::Lcg;

/// Chance per tick that a free-rolling bot picks a new direction
const TURN_PROBABILITY: f64 = 0.01;
/// Chance per tick that a bot with a clear cooldown fires
const FIRE_PROBABILITY: f64 = 0.02;
/// Weight of choosing Down; the remaining mass splits over the other three
const DOWN_WEIGHT: f64 = 0.4;

/// What a bot wants to do this tick
#[derive(Debug, Clone, Copy, Default)]
pub struct BotDecision {
    pub turn: Option<Direction>,
    pub fire: bool,
}

/// Draw a decision for one bot.
///
/// A bot that failed to move last tick always re-rolls its direction;
/// otherwise it occasionally wanders. Downward drift keeps the pressure on
/// the eagle side of the field.
pub fn decide(rng: &mut Lcg, blocked: bool) -> BotDecision {
    let turn = if blocked || rng.chance(TURN_PROBABILITY) {
        Some(pick_direction(rng))
    } else {
        None
    };
    let fire = rng.chance(FIRE_PROBABILITY);
    BotDecision { turn, fire }
}

fn pick_direction(rng: &mut Lcg) -> Direction {
    let roll = rng.next_f64();
    let side = (1.0 - DOWN_WEIGHT) / 3.0;
    if roll < DOWN_WEIGHT {
        Direction::Down
    } else if roll < DOWN_WEIGHT + side {
        Direction::Left
    } else if roll < DOWN_WEIGHT + 2.0 * side {
        Direction::Right
    } else {
        Direction::Up
    }
}
