/// Field geometry - everything is derived from the 13x13 block grid
pub mod field {
    /// Blocks per side of the battlefield
    pub const BLOCKS: usize = 13;
    /// Size of one block in world units
    pub const BLOCK_SIZE: f64 = 16.0;
    /// Battlefield side length in world units
    pub const SIZE: f64 = BLOCKS as f64 * BLOCK_SIZE;

    /// Brick cell size (4x4 sub-cells per block)
    pub const BRICK_SIZE: f64 = 4.0;
    /// Bricks per side (52)
    pub const BRICK_COLS: usize = BLOCKS * 4;
    /// Steel cell size (2x2 sub-cells per block)
    pub const STEEL_SIZE: f64 = 8.0;
    /// Steels per side (26)
    pub const STEEL_COLS: usize = BLOCKS * 2;

    /// Tank bounding box side
    pub const TANK_SIZE: f64 = 16.0;
    /// Bullet bounding box side
    pub const BULLET_SIZE: f64 = 3.0;
}

/// Movement speeds in world units per millisecond
pub mod speed {
    /// Player tank speed
    pub const PLAYER: f64 = 0.045;
    /// Basic and armor bot speed
    pub const BOT_BASIC: f64 = 0.030;
    /// Fast bot speed
    pub const BOT_FAST: f64 = 0.060;
    /// Power bot speed
    pub const BOT_POWER: f64 = 0.045;
    /// Bullet speed (all bullets)
    pub const BULLET: f64 = 0.180;
}

/// Simulation timing
pub mod timing {
    /// Server tick rate in Hz
    pub const TICK_RATE: u64 = 60;
    /// Tick interval in milliseconds
    pub const TICK_INTERVAL_MS: u64 = 1000 / TICK_RATE;
    /// Snapshot broadcast interval in milliseconds
    pub const BROADCAST_INTERVAL_MS: u64 = 16;
    /// Fire cooldown in milliseconds
    pub const FIRE_COOLDOWN_MS: f64 = 300.0;
    /// Invincibility granted on spawn, milliseconds
    pub const SPAWN_HELMET_MS: f64 = 2000.0;
}

/// Collision thresholds for the rectangle-overlap predicate
pub mod collision {
    /// Tank-vs-wall threshold: negative, so sub-unit grazing is allowed
    pub const TANK_WALL_THRESHOLD: f64 = -0.01;
    /// Bullet collisions use exact overlap
    pub const BULLET_THRESHOLD: f64 = 0.0;
    /// Turn alignment snaps the cross axis to this grid
    pub const ALIGN_GRID: f64 = 8.0;
}

/// Spawn tables
pub mod spawn {
    /// Host tank spawn (bottom row, left of the eagle)
    pub const HOST: (f64, f64) = (64.0, 192.0);
    /// Guest tank spawn (bottom row, right of the eagle)
    pub const GUEST: (f64, f64) = (128.0, 192.0);
    /// Bot spawn points, cycled in order (top row corners and center)
    pub const BOT_CYCLE: [(f64, f64); 3] = [(0.0, 0.0), (96.0, 0.0), (192.0, 0.0)];
    /// Bots queued per game
    pub const BOT_TOTAL: usize = 20;
    /// Bots spawned immediately at engine start
    pub const BOT_INITIAL_BURST: usize = 4;
    /// Interval between subsequent bot spawns, milliseconds
    pub const BOT_SPAWN_INTERVAL_MS: f64 = 3000.0;
    /// Queue indices that carry a power-up marker (the 4th, 11th, 18th)
    pub const POWER_UP_INDICES: [usize; 3] = [3, 10, 17];
    /// Lives per player slot
    pub const PLAYER_LIVES: u32 = 3;
}

/// Score credited for destroying a bot, by level
pub mod score {
    pub const BASIC: u32 = 100;
    pub const FAST: u32 = 200;
    pub const POWER: u32 = 300;
    pub const ARMOR: u32 = 400;
}

/// Client reconciliation contract (exported so tests pin the wire agreement)
pub mod reconcile {
    /// Below this positional error the client keeps its prediction
    pub const SNAP_THRESHOLD: f64 = 2.0;
    /// Interpolation factor applied per received snapshot beyond the threshold
    pub const LERP_FACTOR: f64 = 0.3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_derivation() {
        assert_eq!(field::SIZE, 208.0);
        assert_eq!(field::BRICK_COLS, 52);
        assert_eq!(field::STEEL_COLS, 26);
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(timing::TICK_INTERVAL_MS, 16);
    }

    #[test]
    fn test_reconciliation_contract_is_pinned() {
        // Wire agreement with the client predictor; changing either value
        // changes how clients reconcile
        assert_eq!(reconcile::SNAP_THRESHOLD, 2.0);
        assert_eq!(reconcile::LERP_FACTOR, 0.3);
    }

    #[test]
    fn test_spawns_inside_field() {
        let max = field::SIZE - field::TANK_SIZE;
        for (x, y) in spawn::BOT_CYCLE {
            assert!(x >= 0.0 && x <= max);
            assert!(y >= 0.0 && y <= max);
        }
        assert!(spawn::HOST.0 <= max && spawn::HOST.1 <= max);
        assert!(spawn::GUEST.0 <= max && spawn::GUEST.1 <= max);
    }
}
