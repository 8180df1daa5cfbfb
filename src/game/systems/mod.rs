pub mod ai;
pub mod bullets;
pub mod movement;
pub mod spawner;
