//! Simulation Drivers
//!
//! Three ways to run the one kernel:
//!
//! - `live`: local input, real time, sole writer of its session's log
//! - `replay`: a finished log against a synthetic clock
//! - `spectator`: a growing log consumed in index-ordered batches
//!
//! Each driver advances synchronously, one `frame()` per tick of its host
//! loop. The async `run` helpers wrap that in a tokio interval and handle
//! pause/resume and close through [`DriverInput`].
//!
//! `transcript` records a finished session with state-hash checkpoints for
//! offline verification.

pub mod live;
pub mod replay;
pub mod spectator;
pub mod transcript;

use std::time::Duration;

use crate::core::hash::StateHash;
use crate::game::config::SimConfig;
use crate::game::events::EventIdx;
use crate::game::state::{Actor, World};

pub use live::{LiveDriver, LivePhase};
pub use replay::ReplayDriver;
pub use spectator::SpectatorDriver;
pub use transcript::{SessionTranscript, TranscriptError};

/// Host input delivered to a driver's run loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverInput {
    /// Jump key (live only).
    Jump,
    /// Window lost focus: stop advancing.
    Pause,
    /// Window regained focus.
    Resume,
    /// Start over (replay only).
    Restart,
    /// Close the view and stop the loop.
    Close,
}

/// State snapshot taken right after an event is applied.
///
/// Drivers that consume the same log must produce identical traces.
#[derive(Clone, Debug, PartialEq)]
pub struct TracePoint {
    /// Event just applied.
    pub idx: EventIdx,
    /// Frames stepped before it was applied.
    pub frame: u64,
    /// Actor after application.
    pub actor: Actor,
    /// Obstacles after application.
    pub obstacle_count: usize,
    /// World hash after application.
    pub state_hash: StateHash,
}

impl TracePoint {
    /// Snapshot the world after applying `idx`.
    pub fn capture(idx: EventIdx, world: &World) -> Self {
        Self {
            idx,
            frame: world.frame,
            actor: world.actor,
            obstacle_count: world.obstacles.len(),
            state_hash: world.compute_hash(),
        }
    }
}

/// Tick interval matching the configured frame rate.
pub fn frame_interval(config: &SimConfig) -> Duration {
    Duration::from_secs_f64(config.frame_ms() / 1000.0)
}
