pub mod constants;
pub mod engine;
pub mod game_loop;
pub mod input;
pub mod state;
pub mod systems;
pub mod tile_map;
