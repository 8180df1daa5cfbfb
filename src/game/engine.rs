//! Per-room engine driver
//!
//! `spawn_engine` builds the game loop and starts two cooperative tasks: the
//! 60 Hz tick task (the single writer) and the snapshot broadcast task. Both
//! check a shared stop flag between iterations and exit on their own; no
//! task is ever aborted mid-tick.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::game::game_loop::{GameLoop, GameLoopEvent};
use crate::game::input::InputSlots;
use crate::game::state::Role;
use crate::game::tile_map::StageParseError;
use crate::lobby::manager::SharedRoomManager;
use crate::lobby::room::RoomChannels;
use crate::metrics::Metrics;
use crate::net::protocol::{now_ms, ErrorKind, GameSnapshot, ServerEvent};

/// Consecutive tick panics tolerated before the room is terminated
const MAX_TICK_FAILURES: u32 = 3;

/// Handle to a running per-room engine
pub struct EngineHandle {
    /// Single-writer game state; the tick task writes, everyone else reads
    pub shared: Arc<RwLock<GameLoop>>,
    /// Latest-input cells fed by the transport
    pub inputs: Arc<InputSlots>,
    stop: Arc<AtomicBool>,
    pub seed: u32,
    pub map_id: u32,
}

impl EngineHandle {
    /// Cooperative stop: both tasks exit between iterations
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Read-only snapshot of the current state
    pub async fn snapshot(&self) -> GameSnapshot {
        let game = self.shared.read().await;
        GameSnapshot::from_state(game.state(), now_ms())
    }
}

/// Build the game loop for a room and start its tick and broadcast tasks
pub fn spawn_engine(
    room_id: &str,
    channels: RoomChannels,
    manager: SharedRoomManager,
    metrics: Arc<Metrics>,
    broadcast_interval: Duration,
) -> Result<EngineHandle, StageParseError> {
    let game = GameLoop::new(room_id)?;
    let seed = game.seed();
    let map_id = game.map_id();

    let shared = Arc::new(RwLock::new(game));
    let inputs = Arc::new(InputSlots::new());
    let stop = Arc::new(AtomicBool::new(false));

    spawn_tick_task(
        room_id.to_string(),
        shared.clone(),
        inputs.clone(),
        stop.clone(),
        channels.clone(),
        manager,
        metrics.clone(),
    );
    spawn_broadcast_task(shared.clone(), stop.clone(), channels, metrics, broadcast_interval);

    info!("Engine started for room {room_id} (seed {seed})");

    Ok(EngineHandle {
        shared,
        inputs,
        stop,
        seed,
        map_id,
    })
}

fn spawn_tick_task(
    room_id: String,
    shared: Arc<RwLock<GameLoop>>,
    inputs: Arc<InputSlots>,
    stop: Arc<AtomicBool>,
    channels: RoomChannels,
    manager: SharedRoomManager,
    metrics: Arc<Metrics>,
) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(
            crate::game::constants::timing::TICK_INTERVAL_MS,
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_tick = Instant::now();
        let mut consecutive_failures: u32 = 0;

        loop {
            ticker.tick().await;
            if stop.load(Ordering::SeqCst) {
                break;
            }

            let delta_ms = last_tick.elapsed().as_secs_f64() * 1000.0;
            last_tick = Instant::now();

            let host_input = inputs.load(Role::Host);
            let guest_input = inputs.load(Role::Guest);

            // The write guard is scoped: the manager lock below is only ever
            // taken with the game lock released.
            let tick_result = {
                let mut game = shared.write().await;
                std::panic::catch_unwind(AssertUnwindSafe(|| {
                    game.tick(delta_ms, host_input.as_ref(), guest_input.as_ref())
                }))
            };

            let events = match tick_result {
                Ok(events) => {
                    consecutive_failures = 0;
                    metrics.ticks_total.fetch_add(1, Ordering::Relaxed);
                    events
                }
                Err(_) => {
                    consecutive_failures += 1;
                    warn!(
                        "Tick panicked in room {room_id} ({consecutive_failures}/{MAX_TICK_FAILURES}); step skipped"
                    );
                    if consecutive_failures >= MAX_TICK_FAILURES {
                        channels.broadcast(&ServerEvent::RoomError {
                            kind: ErrorKind::ServerError,
                            message: "Simulation failed; the room is closed".to_string(),
                        });
                        stop.store(true, Ordering::SeqCst);
                        manager.write().await.finish_room(&room_id);
                        break;
                    }
                    continue;
                }
            };

            let mut game_over = false;
            for event in events {
                match event {
                    GameLoopEvent::MapChanged {
                        bricks_destroyed,
                        steels_destroyed,
                    } => {
                        channels.broadcast(&ServerEvent::MapChanges {
                            bricks_destroyed,
                            steels_destroyed,
                        });
                    }
                    GameLoopEvent::GameOver {
                        status,
                        winner,
                        reason,
                    } => {
                        debug!("Room {room_id} verdict: {status:?} ({reason})");
                        channels.broadcast(&ServerEvent::GameOver {
                            winner,
                            reason,
                            timestamp: now_ms(),
                        });
                        game_over = true;
                    }
                }
            }

            if game_over {
                stop.store(true, Ordering::SeqCst);
                manager.write().await.finish_room(&room_id);
                break;
            }
        }

        debug!("Tick task for room {room_id} stopped");
    });
}

fn spawn_broadcast_task(
    shared: Arc<RwLock<GameLoop>>,
    stop: Arc<AtomicBool>,
    channels: RoomChannels,
    metrics: Arc<Metrics>,
    broadcast_interval: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = interval(broadcast_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if stop.load(Ordering::SeqCst) {
                break;
            }

            let snapshot = {
                let game = shared.read().await;
                GameSnapshot::from_state(game.state(), now_ms())
            };

            let dropped = channels.broadcast(&ServerEvent::StateSync(snapshot));
            if dropped > 0 {
                metrics
                    .snapshots_dropped_total
                    .fetch_add(dropped as u64, Ordering::Relaxed);
            }
        }
    });
}
