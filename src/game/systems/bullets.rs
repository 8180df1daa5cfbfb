//! Bullet lifecycle: firing, flight, wall hits, tank hits

use crate::game::constants::{collision, field, speed, timing};
use crate::game::state::{Bullet, Direction, GameState, Tank, TankSide};

/// Result of the bullet-vs-tank pass, consumed by the game loop for
/// scoring and lives accounting
#[derive(Debug, Clone, Copy)]
pub struct TankHit {
    pub bullet_id: u32,
    pub owner_id: u32,
    pub target_id: u32,
    pub killed: bool,
}

/// Muzzle position: tank front-center, offset outward by the bullet size
pub fn muzzle_position(tank: &Tank) -> (f64, f64) {
    let center = (field::TANK_SIZE - field::BULLET_SIZE) / 2.0;
    match tank.direction {
        Direction::Up => (tank.x + center, tank.y - field::BULLET_SIZE),
        Direction::Down => (tank.x + center, tank.y + field::TANK_SIZE),
        Direction::Left => (tank.x - field::BULLET_SIZE, tank.y + center),
        Direction::Right => (tank.x + field::TANK_SIZE, tank.y + center),
    }
}

/// Fire a bullet from a tank if its cooldown allows.
///
/// Returns the new bullet id; firing under cooldown produces nothing.
pub fn fire_bullet(state: &mut GameState, tank_id: u32) -> Option<u32> {
    let tank = state.tank(tank_id)?;
    if !tank.alive || tank.cooldown_ms > 0.0 {
        return None;
    }

    let (x, y) = muzzle_position(tank);
    let direction = tank.direction;
    let power = tank.bullet_power();

    let id = state.alloc_bullet_id();
    state.bullets.push(Bullet {
        id,
        x,
        y,
        direction,
        speed: speed::BULLET,
        tank_id,
        power,
    });

    if let Some(tank) = state.tank_mut(tank_id) {
        tank.cooldown_ms = timing::FIRE_COOLDOWN_MS;
    }
    Some(id)
}

/// Advance all bullets and drop the ones whose box leaves the field
pub fn advance_bullets(state: &mut GameState, delta_ms: f64) {
    for bullet in &mut state.bullets {
        let (dx, dy) = bullet.direction.step();
        bullet.x += dx * bullet.speed * delta_ms;
        bullet.y += dy * bullet.speed * delta_ms;
    }
    state.bullets.retain(|b| {
        b.x >= 0.0
            && b.y >= 0.0
            && b.x + field::BULLET_SIZE <= field::SIZE
            && b.y + field::BULLET_SIZE <= field::SIZE
    });
}

/// Bullet-vs-wall pass.
///
/// Every intersected brick is destroyed; steel only falls to power >= 3. Any
/// wall contact (including standing steel and the eagle) consumes the
/// bullet. Destroyed cell indices accumulate on the state for the
/// `map_changes` addendum. Returns whether the eagle broke this pass.
pub fn bullet_wall_collisions(state: &mut GameState) -> bool {
    let mut removed_bullets: Vec<u32> = Vec::new();
    let mut bricks_hit: Vec<u32> = Vec::new();
    let mut steels_destroyed: Vec<u32> = Vec::new();
    let mut eagle_hit = false;

    let eagle_rect = state.map.eagle_rect();

    for bullet in &state.bullets {
        let rect = bullet.rect();
        let mut consumed = false;

        for index in state
            .map
            .bricks_overlapping(&rect, collision::BULLET_THRESHOLD)
        {
            bricks_hit.push(index as u32);
            consumed = true;
        }

        for index in state
            .map
            .steels_overlapping(&rect, collision::BULLET_THRESHOLD)
        {
            if bullet.power >= 3 {
                steels_destroyed.push(index as u32);
            }
            consumed = true;
        }

        if let Some(eagle) = eagle_rect {
            if rect.overlaps(&eagle, collision::BULLET_THRESHOLD) {
                eagle_hit = true;
                consumed = true;
            }
        }

        if consumed {
            removed_bullets.push(bullet.id);
        }
    }

    for index in bricks_hit {
        if state.map.destroy_brick(index as usize) {
            state.pending_bricks_destroyed.push(index);
        }
    }
    for index in steels_destroyed {
        if state.map.destroy_steel(index as usize) {
            state.pending_steels_destroyed.push(index);
        }
    }

    let eagle_broke = eagle_hit && !state.map.is_eagle_broken();
    if eagle_broke {
        state.map.break_eagle();
    }

    state.bullets.retain(|b| !removed_bullets.contains(&b.id));
    eagle_broke
}

/// Bullet-vs-tank pass.
///
/// Owner is skipped. Player fire never damages the other player (the bullet
/// still dies); bot fire passes through other bots entirely; a helmet
/// absorbs bot fire without damage. Orphaned bullets (owner no longer in the
/// room) are destroyed outright.
pub fn bullet_tank_collisions(state: &mut GameState) -> Vec<TankHit> {
    let mut hits = Vec::new();
    let mut removed_bullets: Vec<u32> = Vec::new();

    for bullet_index in 0..state.bullets.len() {
        let bullet = state.bullets[bullet_index].clone();

        let owner_side = match state.tank(bullet.tank_id) {
            Some(owner) => owner.side,
            None => {
                removed_bullets.push(bullet.id);
                continue;
            }
        };

        let rect = bullet.rect();
        for tank_index in 0..state.tanks.len() {
            let (target_id, target_side, target_rect, helmet) = {
                let tank = &state.tanks[tank_index];
                (tank.id, tank.side, tank.rect(), tank.helmet_ms > 0.0)
            };
            if target_id == bullet.tank_id || !state.tanks[tank_index].alive {
                continue;
            }
            if !rect.overlaps(&target_rect, collision::BULLET_THRESHOLD) {
                continue;
            }

            match (owner_side, target_side) {
                // Friendly fire between players is suppressed
                (TankSide::Player, TankSide::Player) => {
                    removed_bullets.push(bullet.id);
                }
                (TankSide::Player, TankSide::Bot) => {
                    removed_bullets.push(bullet.id);
                    let killed = damage_tank(state, tank_index);
                    hits.push(TankHit {
                        bullet_id: bullet.id,
                        owner_id: bullet.tank_id,
                        target_id,
                        killed,
                    });
                }
                (TankSide::Bot, TankSide::Player) => {
                    removed_bullets.push(bullet.id);
                    if !helmet {
                        let killed = damage_tank(state, tank_index);
                        hits.push(TankHit {
                            bullet_id: bullet.id,
                            owner_id: bullet.tank_id,
                            target_id,
                            killed,
                        });
                    }
                }
                // Bot fire passes through bots: no consume, no damage
                (TankSide::Bot, TankSide::Bot) => continue,
            }
            break;
        }
    }

    state.bullets.retain(|b| !removed_bullets.contains(&b.id));
    hits
}

/// Apply one point of damage; returns true when this kills the tank
fn damage_tank(state: &mut GameState, tank_index: usize) -> bool {
    let tank = &mut state.tanks[tank_index];
    tank.hp = tank.hp.saturating_sub(1);
    if tank.hp == 0 {
        tank.alive = false;
        true
    } else {
        false
    }
}

/// Remove bullets whose owning tank is gone
pub fn purge_orphan_bullets(state: &mut GameState) {
    let tank_ids: Vec<u32> = state.tanks.iter().map(|t| t.id).collect();
    state.bullets.retain(|b| tank_ids.contains(&b.tank_id));
}

/// Construct a bullet directly, bypassing the cooldown gate.
///
/// Used by tests and the tick bench to stage specific collision scenarios.
pub fn raw_bullet(id: u32, x: f64, y: f64, direction: Direction, tank_id: u32, power: u8) -> Bullet {
    Bullet {
        id,
        x,
        y,
        direction,
        speed: speed::BULLET,
        tank_id,
        power,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Role, Tank, TankLevel};
    use crate::game::systems::spawner::{Lcg, QueuedBot};
    use crate::game::tile_map::{TileMap, STAGE_1};

    fn empty_state() -> GameState {
        let rows = vec![". . . . . . . . . . . . ."; 13];
        GameState::new(
            TileMap::parse(&rows.join("\n")).unwrap(),
            Vec::new(),
            Lcg::new(1),
        )
    }

    fn stage_state() -> GameState {
        GameState::new(TileMap::parse(STAGE_1).unwrap(), Vec::new(), Lcg::new(1))
    }

    fn add_player(state: &mut GameState, role: Role, x: f64, y: f64) -> u32 {
        let id = state.alloc_tank_id();
        let mut tank = Tank::player(id, role);
        tank.x = x;
        tank.y = y;
        tank.helmet_ms = 0.0;
        state.tanks.push(tank);
        state.slot_mut(role).active_tank_id = Some(id);
        id
    }

    fn add_bot(state: &mut GameState, level: TankLevel, x: f64, y: f64) -> u32 {
        let id = state.alloc_tank_id();
        let tank = Tank::bot(id, QueuedBot { level, with_power_up: false }, x, y);
        state.tanks.push(tank);
        id
    }

    #[test]
    fn test_muzzle_positions() {
        let mut state = empty_state();
        let id = add_player(&mut state, Role::Host, 64.0, 64.0);
        let tank = state.tank_mut(id).unwrap();

        tank.direction = Direction::Up;
        assert_eq!(muzzle_position(tank), (70.5, 61.0));
        tank.direction = Direction::Down;
        assert_eq!(muzzle_position(tank), (70.5, 80.0));
        tank.direction = Direction::Left;
        assert_eq!(muzzle_position(tank), (61.0, 70.5));
        tank.direction = Direction::Right;
        assert_eq!(muzzle_position(tank), (80.0, 70.5));
    }

    #[test]
    fn test_fire_sets_cooldown_and_blocks_refire() {
        let mut state = empty_state();
        let id = add_player(&mut state, Role::Host, 64.0, 64.0);

        assert!(fire_bullet(&mut state, id).is_some());
        assert_eq!(state.tank(id).unwrap().cooldown_ms, timing::FIRE_COOLDOWN_MS);
        // Cooldown gate
        assert!(fire_bullet(&mut state, id).is_none());
        assert_eq!(state.bullets.len(), 1);
        assert_eq!(state.bullets[0].power, 1);
    }

    #[test]
    fn test_dead_tank_cannot_fire() {
        let mut state = empty_state();
        let id = add_player(&mut state, Role::Host, 64.0, 64.0);
        state.tank_mut(id).unwrap().alive = false;
        assert!(fire_bullet(&mut state, id).is_none());
    }

    #[test]
    fn test_advance_and_out_of_bounds() {
        let mut state = empty_state();
        state
            .bullets
            .push(raw_bullet(1, 100.0, 2.0, Direction::Up, 99, 1));
        // 2 units of travel upward exits the field
        advance_bullets(&mut state, 16.0);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_advance_moves_by_speed() {
        let mut state = empty_state();
        state
            .bullets
            .push(raw_bullet(1, 100.0, 100.0, Direction::Right, 99, 1));
        advance_bullets(&mut state, 10.0);
        assert!((state.bullets[0].x - (100.0 + 0.18 * 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_brick_destroyed_and_bullet_consumed() {
        let mut state = stage_state();
        // Inside the brick block at (1,1): world x,y in [16,32)
        state
            .bullets
            .push(raw_bullet(1, 20.0, 20.0, Direction::Down, 99, 1));
        let brick_index = 5 * 52 + 5;
        assert!(state.map.brick_at(brick_index));

        bullet_wall_collisions(&mut state);

        assert!(state.bullets.is_empty());
        assert!(!state.map.brick_at(brick_index));
        assert!(state
            .pending_bricks_destroyed
            .contains(&(brick_index as u32)));
    }

    #[test]
    fn test_low_power_bullet_spares_steel() {
        let mut state = stage_state();
        // Steel block (0,6): world [0,16) x [96,112)
        let steel_index = 12 * 26;
        assert!(state.map.steel_at(steel_index));
        state
            .bullets
            .push(raw_bullet(1, 4.0, 100.0, Direction::Left, 99, 2));

        bullet_wall_collisions(&mut state);

        // Bullet consumed, steel intact
        assert!(state.bullets.is_empty());
        assert!(state.map.steel_at(steel_index));
        assert!(state.pending_steels_destroyed.is_empty());
    }

    #[test]
    fn test_power_three_destroys_steel_and_brick() {
        let mut state = stage_state();
        let steel_index = 12 * 26;
        state
            .bullets
            .push(raw_bullet(1, 4.0, 100.0, Direction::Left, 99, 3));
        bullet_wall_collisions(&mut state);
        assert!(!state.map.steel_at(steel_index));
        assert!(state.pending_steels_destroyed.contains(&(steel_index as u32)));

        // Same power against brick
        state
            .bullets
            .push(raw_bullet(2, 20.0, 20.0, Direction::Down, 99, 3));
        bullet_wall_collisions(&mut state);
        assert!(!state.pending_bricks_destroyed.is_empty());
    }

    #[test]
    fn test_eagle_hit_breaks_once() {
        let mut state = stage_state();
        // Eagle block at (96..112, 192..208)
        state
            .bullets
            .push(raw_bullet(1, 100.0, 195.0, Direction::Down, 99, 1));
        assert!(bullet_wall_collisions(&mut state));
        assert!(state.map.is_eagle_broken());
        assert!(state.bullets.is_empty());

        // A second hit is consumed but reports no new break
        state
            .bullets
            .push(raw_bullet(2, 100.0, 195.0, Direction::Down, 99, 1));
        assert!(!bullet_wall_collisions(&mut state));
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_friendly_fire_suppressed() {
        let mut state = empty_state();
        let host = add_player(&mut state, Role::Host, 64.0, 64.0);
        let guest = add_player(&mut state, Role::Guest, 80.0, 64.0);

        // Host bullet sitting on the guest tank
        state
            .bullets
            .push(raw_bullet(1, 82.0, 70.0, Direction::Right, host, 1));
        let hits = bullet_tank_collisions(&mut state);

        assert!(hits.is_empty());
        assert!(state.bullets.is_empty());
        assert_eq!(state.tank(guest).unwrap().hp, 1);
        assert!(state.tank(guest).unwrap().alive);
    }

    #[test]
    fn test_player_bullet_kills_bot() {
        let mut state = empty_state();
        let host = add_player(&mut state, Role::Host, 0.0, 0.0);
        let bot = add_bot(&mut state, TankLevel::Basic, 64.0, 64.0);

        state
            .bullets
            .push(raw_bullet(1, 70.0, 70.0, Direction::Right, host, 1));
        let hits = bullet_tank_collisions(&mut state);

        assert_eq!(hits.len(), 1);
        assert!(hits[0].killed);
        assert_eq!(hits[0].target_id, bot);
        assert!(!state.tank(bot).unwrap().alive);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_armor_bot_survives_three_hits() {
        let mut state = empty_state();
        let host = add_player(&mut state, Role::Host, 0.0, 0.0);
        let bot = add_bot(&mut state, TankLevel::Armor, 64.0, 64.0);

        for shot in 0..3 {
            state
                .bullets
                .push(raw_bullet(10 + shot, 70.0, 70.0, Direction::Right, host, 1));
            let hits = bullet_tank_collisions(&mut state);
            assert_eq!(hits.len(), 1);
            assert!(!hits[0].killed);
        }
        assert_eq!(state.tank(bot).unwrap().hp, 1);

        state
            .bullets
            .push(raw_bullet(20, 70.0, 70.0, Direction::Right, host, 1));
        let hits = bullet_tank_collisions(&mut state);
        assert!(hits[0].killed);
    }

    #[test]
    fn test_helmet_absorbs_bot_fire() {
        let mut state = empty_state();
        let player = add_player(&mut state, Role::Host, 64.0, 64.0);
        let bot = add_bot(&mut state, TankLevel::Basic, 0.0, 0.0);
        state.tank_mut(player).unwrap().helmet_ms = 1000.0;

        state
            .bullets
            .push(raw_bullet(1, 70.0, 70.0, Direction::Down, bot, 1));
        let hits = bullet_tank_collisions(&mut state);

        assert!(hits.is_empty());
        // Bullet still consumed
        assert!(state.bullets.is_empty());
        assert_eq!(state.tank(player).unwrap().hp, 1);
    }

    #[test]
    fn test_bot_fire_passes_through_bots() {
        let mut state = empty_state();
        let shooter = add_bot(&mut state, TankLevel::Basic, 0.0, 0.0);
        let other = add_bot(&mut state, TankLevel::Basic, 64.0, 64.0);

        state
            .bullets
            .push(raw_bullet(1, 70.0, 70.0, Direction::Down, shooter, 1));
        let hits = bullet_tank_collisions(&mut state);

        assert!(hits.is_empty());
        // No consume: the bullet keeps flying
        assert_eq!(state.bullets.len(), 1);
        assert!(state.tank(other).unwrap().alive);
    }

    #[test]
    fn test_owner_is_skipped() {
        let mut state = empty_state();
        let host = add_player(&mut state, Role::Host, 64.0, 64.0);
        // Bullet overlapping its own tank (just fired)
        state
            .bullets
            .push(raw_bullet(1, 70.0, 70.0, Direction::Up, host, 1));
        let hits = bullet_tank_collisions(&mut state);
        assert!(hits.is_empty());
        assert_eq!(state.bullets.len(), 1);
    }

    #[test]
    fn test_orphan_bullet_destroyed() {
        let mut state = empty_state();
        state
            .bullets
            .push(raw_bullet(1, 70.0, 70.0, Direction::Up, 12345, 1));
        bullet_tank_collisions(&mut state);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_purge_orphan_bullets() {
        let mut state = empty_state();
        let host = add_player(&mut state, Role::Host, 64.0, 64.0);
        state
            .bullets
            .push(raw_bullet(1, 10.0, 10.0, Direction::Up, host, 1));
        state
            .bullets
            .push(raw_bullet(2, 20.0, 10.0, Direction::Up, 999, 1));
        purge_orphan_bullets(&mut state);
        assert_eq!(state.bullets.len(), 1);
        assert_eq!(state.bullets[0].id, 1);
    }
}
