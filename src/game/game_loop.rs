//! Per-room authoritative simulation
//!
//! One `GameLoop` exists per playing room. The tick body is the single
//! writer for the room's state; everything else observes snapshots. Tick
//! ordering is fixed: players, bots, bullet flight, bullet-wall,
//! bullet-tank, countdowns, spawn schedule, verdict.

use serde::{Deserialize, Serialize};

use crate::game::constants::{score, spawn};
use crate::game::state::{
    GameState, GameStatus, Role, Tank, TankLevel, TankSide,
};
use crate::game::systems::{ai, bullets, movement, spawner};
use crate::game::tile_map::{StageParseError, TileMap, STAGE_1, STAGE_1_ID};
use crate::net::protocol::PlayerInput;

/// Reported with `game_over`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Host,
    Guest,
    Draw,
}

/// Events surfaced by a tick for the transport to fan out
#[derive(Debug, Clone)]
pub enum GameLoopEvent {
    /// Wall cells destroyed this tick (the `map_changes` addendum)
    MapChanged {
        bricks_destroyed: Vec<u32>,
        steels_destroyed: Vec<u32>,
    },
    /// The room reached a verdict; the engine stops after this tick
    GameOver {
        status: GameStatus,
        winner: Winner,
        reason: String,
    },
}

/// Authoritative game engine for one room
pub struct GameLoop {
    state: GameState,
    seed: u32,
    map_id: u32,
}

impl GameLoop {
    /// Build the engine for a room: stage 1 map, seeded bot queue, both
    /// player tanks, and the initial burst of bots.
    pub fn new(room_id: &str) -> Result<Self, StageParseError> {
        let seed = spawner::seed_from_room_id(room_id);
        let mut rng = spawner::Lcg::new(seed);
        let queue = spawner::build_bot_queue(&mut rng);
        let map = TileMap::parse(STAGE_1)?;
        let mut state = GameState::new(map, queue, rng);

        for role in [Role::Host, Role::Guest] {
            let id = state.alloc_tank_id();
            state.tanks.push(Tank::player(id, role));
            state.slot_mut(role).active_tank_id = Some(id);
        }

        for _ in 0..spawn::BOT_INITIAL_BURST {
            spawner::spawn_next_bot(&mut state);
        }
        state.spawn_timer_ms = spawn::BOT_SPAWN_INTERVAL_MS;

        Ok(Self {
            state,
            seed,
            map_id: STAGE_1_ID,
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn map_id(&self) -> u32 {
        self.map_id
    }

    /// Winner by score; draw on tie
    pub fn winner(&self) -> Winner {
        match self.state.host.score.cmp(&self.state.guest.score) {
            std::cmp::Ordering::Greater => Winner::Host,
            std::cmp::Ordering::Less => Winner::Guest,
            std::cmp::Ordering::Equal => Winner::Draw,
        }
    }

    /// Run one simulation step.
    ///
    /// `delta_ms` is the wall-clock time since the previous tick; inputs are
    /// the latest-value cells for each slot (None until a slot has sent
    /// anything).
    pub fn tick(
        &mut self,
        delta_ms: f64,
        host_input: Option<&PlayerInput>,
        guest_input: Option<&PlayerInput>,
    ) -> Vec<GameLoopEvent> {
        let mut events = Vec::new();
        if self.state.status != GameStatus::Playing {
            return events;
        }

        self.state.tick += 1;

        // Tanks that died last tick had their death snapshot; drop them now
        // and respawn player slots that still have lives.
        self.purge_dead_tanks();
        bullets::purge_orphan_bullets(&mut self.state);

        // 1. Player tanks, host then guest
        self.update_player(Role::Host, host_input, delta_ms);
        self.update_player(Role::Guest, guest_input, delta_ms);

        // 2. Bot tanks, decisions folded into the tick
        self.update_bots(delta_ms);

        // 3. Bullet flight
        bullets::advance_bullets(&mut self.state, delta_ms);

        // 4. Bullet-wall
        let eagle_broke = bullets::bullet_wall_collisions(&mut self.state);

        // 5. Bullet-tank
        let hits = bullets::bullet_tank_collisions(&mut self.state);
        self.settle_hits(&hits);

        // 6. Countdowns
        for tank in &mut self.state.tanks {
            tank.cooldown_ms = (tank.cooldown_ms - delta_ms).max(0.0);
            tank.helmet_ms = (tank.helmet_ms - delta_ms).max(0.0);
            tank.frozen_ms = (tank.frozen_ms - delta_ms).max(0.0);
        }

        // 7. Bot spawn schedule
        spawner::run_spawn_schedule(&mut self.state, delta_ms);

        // Surface wall destruction for the map_changes addendum
        let bricks = std::mem::take(&mut self.state.pending_bricks_destroyed);
        let steels = std::mem::take(&mut self.state.pending_steels_destroyed);
        if !bricks.is_empty() || !steels.is_empty() {
            events.push(GameLoopEvent::MapChanged {
                bricks_destroyed: bricks,
                steels_destroyed: steels,
            });
        }

        // 8. Verdict
        if let Some(event) = self.evaluate_verdict(eagle_broke) {
            events.push(event);
        }

        events
    }

    fn purge_dead_tanks(&mut self) {
        let dead: Vec<u32> = self
            .state
            .tanks
            .iter()
            .filter(|t| !t.alive)
            .map(|t| t.id)
            .collect();
        if dead.is_empty() {
            return;
        }

        self.state.tanks.retain(|t| t.alive);

        for id in dead {
            let Some(role) = self.state.role_of_tank(id) else {
                continue;
            };
            self.state.slot_mut(role).active_tank_id = None;
            if self.state.slot(role).lives > 0 {
                let new_id = self.state.alloc_tank_id();
                self.state.tanks.push(Tank::player(new_id, role));
                self.state.slot_mut(role).active_tank_id = Some(new_id);
            }
        }
    }

    fn update_player(&mut self, role: Role, input: Option<&PlayerInput>, delta_ms: f64) {
        let Some(input) = input else { return };
        let Some(tank_id) = self.state.slot(role).active_tank_id else {
            return;
        };

        {
            let state = &mut self.state;
            let Some(index) = state.tanks.iter().position(|t| t.id == tank_id) else {
                return;
            };
            // Split borrow: the map is read-only while the tank mutates
            let (map, tank) = (&state.map, &mut state.tanks[index]);
            if !tank.alive {
                return;
            }

            if let Some(direction) = input.direction {
                movement::apply_direction(map, tank, direction);
            }
            tank.moving = input.moving;
            movement::step_tank(map, tank, delta_ms);
        }

        if input.firing {
            bullets::fire_bullet(&mut self.state, tank_id);
        }
    }

    fn update_bots(&mut self, delta_ms: f64) {
        let bot_ids: Vec<u32> = self
            .state
            .tanks
            .iter()
            .filter(|t| t.side == TankSide::Bot && t.alive)
            .map(|t| t.id)
            .collect();

        for id in bot_ids {
            let fire = {
                let state = &mut self.state;
                let Some(index) = state.tanks.iter().position(|t| t.id == id) else {
                    continue;
                };
                let map = &state.map;
                let rng = &mut state.rng;
                let tank = &mut state.tanks[index];

                let moved = movement::step_tank(map, tank, delta_ms);
                let blocked = !moved && tank.frozen_ms <= 0.0;
                let decision = ai::decide(rng, blocked);
                if let Some(direction) = decision.turn {
                    movement::apply_direction(map, tank, direction);
                }
                decision.fire && tank.cooldown_ms <= 0.0
            };

            if fire {
                bullets::fire_bullet(&mut self.state, id);
            }
        }
    }

    /// Scoring and lives accounting for this tick's tank hits
    fn settle_hits(&mut self, hits: &[bullets::TankHit]) {
        for hit in hits {
            let Some(target) = self.state.tank(hit.target_id) else {
                continue;
            };
            match target.side {
                TankSide::Bot if hit.killed => {
                    let points = match target.level {
                        TankLevel::Basic => score::BASIC,
                        TankLevel::Fast => score::FAST,
                        TankLevel::Power => score::POWER,
                        TankLevel::Armor => score::ARMOR,
                    };
                    if let Some(role) = self.state.role_of_tank(hit.owner_id) {
                        self.state.slot_mut(role).score += points;
                    }
                }
                TankSide::Player if hit.killed => {
                    if let Some(role) = self.state.role_of_tank(hit.target_id) {
                        let slot = self.state.slot_mut(role);
                        slot.lives = slot.lives.saturating_sub(1);
                    }
                }
                _ => {}
            }
        }
    }

    fn evaluate_verdict(&mut self, eagle_broke: bool) -> Option<GameLoopEvent> {
        if eagle_broke {
            self.state.status = GameStatus::Lost;
            return Some(GameLoopEvent::GameOver {
                status: GameStatus::Lost,
                winner: Winner::Draw,
                reason: "eagle_destroyed".to_string(),
            });
        }

        let slot_out = |slot: &crate::game::state::PlayerSlotState, state: &GameState| {
            slot.lives == 0
                && slot
                    .active_tank_id
                    .and_then(|id| state.tank(id))
                    .map_or(true, |t| !t.alive)
        };
        if slot_out(&self.state.host, &self.state) && slot_out(&self.state.guest, &self.state) {
            self.state.status = GameStatus::Lost;
            return Some(GameLoopEvent::GameOver {
                status: GameStatus::Lost,
                winner: Winner::Draw,
                reason: "players_eliminated".to_string(),
            });
        }

        if self.state.remaining_bots() == 0 && self.state.alive_bot_count() == 0 {
            self.state.status = GameStatus::Won;
            return Some(GameLoopEvent::GameOver {
                status: GameStatus::Won,
                winner: self.winner(),
                reason: "enemies_cleared".to_string(),
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::{field, timing};
    use crate::game::state::{Direction, TankColor};
    use crate::game::systems::bullets::raw_bullet;

    const DT: f64 = timing::TICK_INTERVAL_MS as f64;

    fn input(direction: Option<Direction>, moving: bool, firing: bool) -> PlayerInput {
        PlayerInput {
            kind: crate::net::protocol::InputKind::State,
            direction,
            moving,
            firing,
            timestamp: 0.0,
        }
    }

    fn engine() -> GameLoop {
        GameLoop::new("ROOM42").unwrap()
    }

    /// Tick with no player input
    fn idle_tick(engine: &mut GameLoop) -> Vec<GameLoopEvent> {
        engine.tick(DT, None, None)
    }

    #[test]
    fn test_new_engine_layout() {
        let engine = engine();
        let state = engine.state();

        let host_tank = state
            .tank(state.host.active_tank_id.unwrap())
            .unwrap();
        assert_eq!(host_tank.color, TankColor::Yellow);
        assert_eq!((host_tank.x, host_tank.y), spawn::HOST);

        let guest_tank = state
            .tank(state.guest.active_tank_id.unwrap())
            .unwrap();
        assert_eq!(guest_tank.color, TankColor::Green);

        // Initial burst
        assert_eq!(state.alive_bot_count(), spawn::BOT_INITIAL_BURST);
        assert_eq!(
            state.remaining_bots(),
            spawn::BOT_TOTAL - spawn::BOT_INITIAL_BURST
        );
    }

    #[test]
    fn test_same_room_id_same_queue() {
        let a = GameLoop::new("ABCDEF").unwrap();
        let b = GameLoop::new("ABCDEF").unwrap();
        assert_eq!(a.state().bot_queue, b.state().bot_queue);
        assert_eq!(a.seed(), b.seed());
    }

    #[test]
    fn test_fire_respects_cooldown() {
        let mut engine = engine();
        let fire = input(None, false, true);

        engine.tick(DT, Some(&fire), None);
        let player_bullets = |e: &GameLoop| {
            let host_id = e.state().host.active_tank_id.unwrap();
            e.state()
                .bullets
                .iter()
                .filter(|b| b.tank_id == host_id)
                .count()
        };
        assert_eq!(player_bullets(&engine), 1);

        // Held trigger while on cooldown adds nothing
        engine.tick(DT, Some(&fire), None);
        assert_eq!(player_bullets(&engine), 1);
    }

    #[test]
    fn test_cooldown_expires_after_300ms() {
        let mut engine = engine();
        let fire = input(None, false, true);
        engine.tick(DT, Some(&fire), None);

        // Drain the cooldown with idle trigger
        let no_fire = input(None, false, false);
        for _ in 0..((timing::FIRE_COOLDOWN_MS / DT) as usize + 1) {
            engine.tick(DT, Some(&no_fire), None);
        }
        let host_id = engine.state().host.active_tank_id.unwrap();
        assert_eq!(engine.state().tank(host_id).unwrap().cooldown_ms, 0.0);
    }

    #[test]
    fn test_input_is_idempotent_for_turns() {
        let mut engine = engine();
        let up_then_left = input(Some(Direction::Left), false, false);

        engine.tick(DT, Some(&up_then_left), None);
        let host_id = engine.state().host.active_tank_id.unwrap();
        let after_first = {
            let t = engine.state().tank(host_id).unwrap();
            (t.x, t.y, t.direction)
        };

        // Re-sending the identical input changes nothing further
        engine.tick(DT, Some(&up_then_left), None);
        let t = engine.state().tank(host_id).unwrap();
        assert_eq!((t.x, t.y, t.direction), after_first);
    }

    #[test]
    fn test_dead_bot_retained_one_tick_then_removed() {
        let mut engine = engine();
        let host_id = engine.state().host.active_tank_id.unwrap();

        // Park a fresh bot away from walls and shoot it point-blank
        let bot_id = {
            let state = engine.state_mut();
            let id = state.alloc_tank_id();
            let bot = Tank::bot(
                id,
                spawner::QueuedBot { level: TankLevel::Basic, with_power_up: false },
                64.0,
                96.0,
            );
            state.tanks.push(bot);
            state
                .bullets
                .push(raw_bullet(9000, 70.0, 100.0, Direction::Down, host_id, 1));
            id
        };

        idle_tick(&mut engine);
        // Death tick: the bot is still present, flagged dead
        let bot = engine.state().tank(bot_id).unwrap();
        assert!(!bot.alive);

        idle_tick(&mut engine);
        assert!(engine.state().tank(bot_id).is_none());
    }

    #[test]
    fn test_kill_credits_score() {
        let mut engine = engine();
        let host_id = engine.state().host.active_tank_id.unwrap();
        {
            let state = engine.state_mut();
            let id = state.alloc_tank_id();
            state.tanks.push(Tank::bot(
                id,
                spawner::QueuedBot { level: TankLevel::Fast, with_power_up: false },
                64.0,
                96.0,
            ));
            state
                .bullets
                .push(raw_bullet(9000, 70.0, 100.0, Direction::Down, host_id, 1));
        }
        idle_tick(&mut engine);
        assert_eq!(engine.state().host.score, score::FAST);
        assert_eq!(engine.state().guest.score, 0);
    }

    #[test]
    fn test_player_death_consumes_life_and_respawns_with_helmet() {
        let mut engine = engine();
        let host_id = engine.state().host.active_tank_id.unwrap();
        let bot_id = {
            let state = engine.state_mut();
            // Kill invincibility so the shot lands
            state.tank_mut(host_id).unwrap().helmet_ms = 0.0;
            let id = state.alloc_tank_id();
            state.tanks.push(Tank::bot(
                id,
                spawner::QueuedBot { level: TankLevel::Basic, with_power_up: false },
                64.0,
                96.0,
            ));
            let (hx, hy) = spawn::HOST;
            state
                .bullets
                .push(raw_bullet(9000, hx + 6.0, hy + 6.0, Direction::Down, id, 1));
            id
        };
        let _ = bot_id;

        idle_tick(&mut engine);
        assert_eq!(engine.state().host.lives, spawn::PLAYER_LIVES - 1);
        // Death tick: old tank flagged dead, slot still pointing at it
        assert!(!engine.state().tank(host_id).unwrap().alive);

        idle_tick(&mut engine);
        let new_id = engine.state().host.active_tank_id.unwrap();
        assert_ne!(new_id, host_id);
        let respawned = engine.state().tank(new_id).unwrap();
        assert!(respawned.alive);
        assert_eq!((respawned.x, respawned.y), spawn::HOST);
        assert!(respawned.helmet_ms > 0.0);
    }

    #[test]
    fn test_eagle_destruction_loses_game() {
        let mut engine = engine();
        let host_id = engine.state().host.active_tank_id.unwrap();
        engine
            .state_mut()
            .bullets
            .push(raw_bullet(9000, 100.0, 195.0, Direction::Down, host_id, 1));

        let events = idle_tick(&mut engine);
        assert!(events.iter().any(|e| matches!(
            e,
            GameLoopEvent::GameOver { status: GameStatus::Lost, reason, .. }
                if reason == "eagle_destroyed"
        )));
        assert_eq!(engine.state().status, GameStatus::Lost);

        // Engine refuses further ticks
        assert!(idle_tick(&mut engine).is_empty());
    }

    #[test]
    fn test_all_bots_cleared_wins() {
        let mut engine = engine();
        {
            let state = engine.state_mut();
            state.bots_spawned = state.bot_queue.len();
            state.tanks.retain(|t| t.side != TankSide::Bot);
            state.host.score = 400;
        }
        let events = idle_tick(&mut engine);
        assert!(events.iter().any(|e| matches!(
            e,
            GameLoopEvent::GameOver { status: GameStatus::Won, winner: Winner::Host, .. }
        )));
    }

    #[test]
    fn test_map_changed_event_on_destruction() {
        let mut engine = engine();
        let host_id = engine.state().host.active_tank_id.unwrap();
        // Into the brick block at (1,1)
        engine
            .state_mut()
            .bullets
            .push(raw_bullet(9000, 20.0, 20.0, Direction::Up, host_id, 1));

        let events = idle_tick(&mut engine);
        let changed = events.iter().find_map(|e| match e {
            GameLoopEvent::MapChanged { bricks_destroyed, .. } => Some(bricks_destroyed.len()),
            _ => None,
        });
        assert!(changed.unwrap_or(0) > 0);

        // Addendum drained: quiet ticks carry no map event
        let events = idle_tick(&mut engine);
        assert!(!events
            .iter()
            .any(|e| matches!(e, GameLoopEvent::MapChanged { .. })));
    }

    #[test]
    fn test_spawn_schedule_adds_bot_every_three_seconds() {
        let mut engine = engine();
        let before = engine.state().bots_spawned;

        // 3 seconds of ticks
        let ticks = (spawn::BOT_SPAWN_INTERVAL_MS / DT) as usize + 1;
        for _ in 0..ticks {
            idle_tick(&mut engine);
        }
        assert_eq!(engine.state().bots_spawned, before + 1);
    }

    #[test]
    fn test_queue_invariant_holds_over_a_minute() {
        let mut engine = engine();
        for _ in 0..3_750 {
            idle_tick(&mut engine);
            let state = engine.state();
            assert_eq!(
                state.remaining_bots() + state.bots_spawned,
                spawn::BOT_TOTAL
            );
            if state.status != GameStatus::Playing {
                break;
            }
        }
        // Unless the bots won first, a minute drains the whole queue
        if engine.state().status == GameStatus::Playing {
            assert_eq!(engine.state().remaining_bots(), 0);
        }
    }

    #[test]
    fn test_simulation_invariants_under_load() {
        let mut engine = engine();
        let host = input(Some(Direction::Up), true, true);
        let guest = input(Some(Direction::Right), true, true);

        for _ in 0..1_200 {
            engine.tick(DT, Some(&host), Some(&guest));
            let state = engine.state();

            for tank in state
                .tanks
                .iter()
                .filter(|t| t.alive && t.side == TankSide::Player)
            {
                assert!(
                    state.map.bricks_overlapping(&tank.rect(), -0.01).is_empty(),
                    "player tank inside a brick at tick {}",
                    state.tick
                );
                assert!(
                    state.map.steels_overlapping(&tank.rect(), -0.01).is_empty(),
                    "player tank inside steel at tick {}",
                    state.tick
                );
            }
            for bullet in &state.bullets {
                assert!(bullet.x >= 0.0 && bullet.x + field::BULLET_SIZE <= field::SIZE);
                assert!(bullet.y >= 0.0 && bullet.y + field::BULLET_SIZE <= field::SIZE);
            }
            // At most one alive player tank per slot color
            for color in [TankColor::Yellow, TankColor::Green] {
                let count = state
                    .tanks
                    .iter()
                    .filter(|t| t.alive && t.side == TankSide::Player && t.color == color)
                    .count();
                assert!(count <= 1);
            }
            if state.status != GameStatus::Playing {
                break;
            }
        }
    }

    #[test]
    fn test_frozen_bot_does_not_move() {
        let mut engine = engine();
        let bot_id = engine
            .state()
            .tanks
            .iter()
            .find(|t| t.side == TankSide::Bot)
            .unwrap()
            .id;
        {
            let state = engine.state_mut();
            let bot = state.tank_mut(bot_id).unwrap();
            bot.frozen_ms = 10_000.0;
            bot.x = 64.0;
            bot.y = 96.0;
        }
        idle_tick(&mut engine);
        let bot = engine.state().tank(bot_id).unwrap();
        assert_eq!((bot.x, bot.y), (64.0, 96.0));
    }

    #[test]
    fn test_tank_rect_never_overlaps_eagle() {
        let engine = engine();
        let eagle = engine.state().map.eagle_rect().unwrap();
        for tank in &engine.state().tanks {
            assert!(!tank.rect().overlaps(&eagle, -0.01));
        }
    }
}
