//! Simulation State Definitions
//!
//! The actor (runner), obstacles, and the world that holds them.

use serde::{Serialize, Deserialize};

use crate::core::hash::{compute_state_hash, StateHash};
use crate::game::config::SimConfig;

// =============================================================================
// ACTOR
// =============================================================================

/// The runner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Horizontal position (fixed during play).
    pub x: f64,
    /// Top edge; grows downward.
    pub y: f64,
    /// Vertical velocity; exactly `0.0` while grounded.
    pub vy: f64,
}

impl Actor {
    /// Actor standing on the ground at its start position.
    pub fn spawn(config: &SimConfig) -> Self {
        Self {
            x: config.actor_x,
            y: config.ground_y(),
            vy: 0.0,
        }
    }

    /// Grounded test used by the jump gate.
    ///
    /// Exact float equality: the ground snap assigns `0.0`, and a tolerance
    /// here would let a jump through on the apex frame of a real jump.
    #[inline]
    #[allow(clippy::float_cmp)]
    pub fn is_grounded(&self) -> bool {
        self.vy == 0.0
    }
}

// =============================================================================
// OBSTACLE
// =============================================================================

/// An obstacle standing on the bottom edge of the field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Left edge.
    pub x: f64,
    /// Width.
    pub w: f64,
    /// Height above the field floor.
    pub h: f64,
    /// Horizontal speed captured at spawn time. `None` moves at the
    /// configured base speed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl Obstacle {
    /// Create an obstacle that moves at the base speed.
    pub const fn new(x: f64, w: f64, h: f64) -> Self {
        Self { x, w, h, speed: None }
    }

    /// Speed this obstacle moves at each frame.
    #[inline]
    pub fn speed_or(&self, base: f64) -> f64 {
        self.speed.unwrap_or(base)
    }
}

// =============================================================================
// WORLD
// =============================================================================

/// Actor, obstacles, and the number of frames stepped so far.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// The runner.
    pub actor: Actor,
    /// Obstacles in spawn order.
    pub obstacles: Vec<Obstacle>,
    /// Frames stepped since the session started.
    pub frame: u64,
}

impl World {
    /// Fresh world: actor on the ground, no obstacles.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            actor: Actor::spawn(config),
            obstacles: Vec::new(),
            frame: 0,
        }
    }

    /// Reset to the initial state.
    pub fn reset(&mut self, config: &SimConfig) {
        self.actor = Actor::spawn(config);
        self.obstacles.clear();
        self.frame = 0;
    }

    /// Advance one frame through the kernel.
    pub fn step(&mut self, config: &SimConfig) {
        crate::game::kernel::step(config, &mut self.actor, &mut self.obstacles);
        self.frame += 1;
    }

    /// Bit-exact hash of the world.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.frame, |hasher| {
            hasher.update_f64(self.actor.x);
            hasher.update_f64(self.actor.y);
            hasher.update_f64(self.actor.vy);
            hasher.update_u64(self.obstacles.len() as u64);
            for obstacle in &self.obstacles {
                hasher.update_f64(obstacle.x);
                hasher.update_f64(obstacle.w);
                hasher.update_f64(obstacle.h);
                hasher.update_bool(obstacle.speed.is_some());
                hasher.update_f64(obstacle.speed.unwrap_or(0.0));
            }
        })
    }
}
