//! Game Logic Module
//!
//! All simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `config`: Physics constants and difficulty pacing
//! - `state`: Actor, obstacles, world
//! - `kernel`: The per-frame transition and event application
//! - `collision`: Actor vs obstacle overlap
//! - `events`: Session events for persistence, replay and spectating

pub mod config;
pub mod state;
pub mod kernel;
pub mod collision;
pub mod events;

// Re-export key types
pub use config::{Pacing, PacingState, SimConfig};
pub use state::{Actor, Obstacle, World};
pub use events::{EventIdx, EventPayload, GameEvent};
