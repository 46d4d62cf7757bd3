//! # Dino Arcade
//!
//! Deterministic runner simulation with an append-only event log that
//! drives live play, replay, and spectating from the same kernel.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DINO ARCADE                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── hash.rs     - World state hashing                       │
//! │                                                              │
//! │  game/           - Simulation (deterministic)                │
//! │  ├── config.rs   - Physics constants, difficulty pacing      │
//! │  ├── state.rs    - Actor, obstacles, world                   │
//! │  ├── kernel.rs   - step / apply_event / create_obstacle      │
//! │  ├── collision.rs- Actor vs obstacle overlap                 │
//! │  └── events.rs   - jump / spawn event log                    │
//! │                                                              │
//! │  driver/         - Ways to run the kernel                    │
//! │  ├── live.rs     - Local input, sole log writer              │
//! │  ├── replay.rs   - Finished log, synthetic clock             │
//! │  ├── spectator.rs- Growing log, polled batches               │
//! │  └── transcript.rs - Checkpointed session record             │
//! │                                                              │
//! │  store/          - Session and event storage                 │
//! │  ├── memory.rs   - In-memory store                           │
//! │  └── writer.rs   - Fire-and-forget writer task               │
//! │                                                              │
//! │  network/        - Store gateway (non-deterministic)         │
//! │  ├── server.rs   - WebSocket server                          │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules never read a clock and never use
//! unseeded randomness. Given the same event log and [`SimConfig`], every
//! driver produces bit-identical `f64` state. The only random draw
//! (obstacle height) happens in the live driver and is captured in the
//! spawn event, so consumers never re-draw it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod store;
pub mod driver;
pub mod network;
pub mod config;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use game::config::{Pacing, SimConfig};
pub use game::events::{EventPayload, GameEvent};
pub use game::state::{Actor, Obstacle, World};
pub use store::{InMemoryStore, SessionRecord, SessionStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation frame rate (Hz); defines the session clock.
pub const DEFAULT_FRAME_RATE: u32 = 60;
