//! Tank Arena Server
//!
//! Authoritative multiplayer server for a 2-player cooperative tank-combat
//! game. Rooms pair a host and a guest over WebSocket; each room runs a
//! 60 Hz server-side simulation and broadcasts JSON snapshots.

pub mod config;
pub mod game;
pub mod lobby;
pub mod metrics;
pub mod net;
pub mod util;
