//! Tank motion: perpendicular-turn grid alignment and wall-checked stepping

use crate::game::constants::{collision, field};
use crate::game::state::{Direction, Tank};
use crate::game::tile_map::TileMap;
use crate::util::rect::Rect;

fn floor8(v: f64) -> f64 {
    (v / collision::ALIGN_GRID).floor() * collision::ALIGN_GRID
}

fn ceil8(v: f64) -> f64 {
    (v / collision::ALIGN_GRID).ceil() * collision::ALIGN_GRID
}

fn round8(v: f64) -> f64 {
    (v / collision::ALIGN_GRID).round() * collision::ALIGN_GRID
}

fn tank_rect_at(x: f64, y: f64) -> Rect {
    Rect::square(x, y, field::TANK_SIZE)
}

fn blocked(map: &TileMap, x: f64, y: f64) -> bool {
    map.collides_solid(&tank_rect_at(x, y), collision::TANK_WALL_THRESHOLD)
}

/// Apply a direction change to a tank.
///
/// A perpendicular turn snaps the cross axis (the one the tank is about to
/// stop traveling along) to the 8-unit grid: of `floor8`/`ceil8`, the single
/// collision-free candidate wins, otherwise `round8`. Parallel turns and
/// same-direction updates leave the position untouched.
pub fn apply_direction(map: &TileMap, tank: &mut Tank, new_direction: Direction) {
    if new_direction == tank.direction {
        return;
    }

    if new_direction.is_perpendicular_to(tank.direction) {
        let align_x = !new_direction.is_horizontal();
        let current = if align_x { tank.x } else { tank.y };

        let lo = floor8(current);
        let hi = ceil8(current);
        let lo_free = if align_x {
            !blocked(map, lo, tank.y)
        } else {
            !blocked(map, tank.x, lo)
        };
        let hi_free = if align_x {
            !blocked(map, hi, tank.y)
        } else {
            !blocked(map, tank.x, hi)
        };

        let snapped = match (lo_free, hi_free) {
            (true, false) => lo,
            (false, true) => hi,
            _ => round8(current),
        };

        if align_x {
            tank.x = snapped;
        } else {
            tank.y = snapped;
        }
    }

    tank.direction = new_direction;
}

/// Move a tank along its facing for one tick.
///
/// The candidate position is clamped to the field; on any wall collision the
/// tank does not move at all this tick (no sliding). Returns whether the tank
/// actually moved.
pub fn step_tank(map: &TileMap, tank: &mut Tank, delta_ms: f64) -> bool {
    if !tank.alive || !tank.moving || tank.frozen_ms > 0.0 {
        return false;
    }

    let (dx, dy) = tank.direction.step();
    let travel = tank.speed() * delta_ms;
    let max = field::SIZE - field::TANK_SIZE;
    let cx = (tank.x + dx * travel).clamp(0.0, max);
    let cy = (tank.y + dy * travel).clamp(0.0, max);

    if cx == tank.x && cy == tank.y {
        return false;
    }

    if blocked(map, cx, cy) {
        return false;
    }

    tank.x = cx;
    tank.y = cy;
    true
}
