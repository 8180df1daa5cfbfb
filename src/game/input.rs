//! Latest-value input cells
//!
//! Each room carries one cell per slot. Connection tasks overwrite the cell
//! on every `player_input`; the tick task reads both cells at the top of
//! each tick. Stale updates collapse - only the newest value matters - so
//! the only synchronization is a short mutex per cell.

use parking_lot::Mutex;

use crate::game::state::Role;
use crate::net::protocol::PlayerInput;

/// Per-slot latest-input cells, shared between transport and engine
#[derive(Debug, Default)]
pub struct InputSlots {
    host: Mutex<Option<PlayerInput>>,
    guest: Mutex<Option<PlayerInput>>,
}

impl InputSlots {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, role: Role) -> &Mutex<Option<PlayerInput>> {
        match role {
            Role::Host => &self.host,
            Role::Guest => &self.guest,
        }
    }

    /// Overwrite the slot's cell with a newer input
    pub fn store(&self, role: Role, input: PlayerInput) {
        *self.cell(role).lock() = Some(input);
    }

    /// Current latest input for the slot, None until the slot ever sent one.
    ///
    /// Non-consuming: the cell keeps holding the value so a quiet client
    /// keeps its last intent across ticks.
    pub fn load(&self, role: Role) -> Option<PlayerInput> {
        self.cell(role).lock().clone()
    }

    /// Drop a slot's input (on disconnect, so a ghost tank stops moving)
    pub fn clear(&self, role: Role) {
        *self.cell(role).lock() = None;
    }
}
