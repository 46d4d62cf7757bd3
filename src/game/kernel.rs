//! Physics Kernel
//!
//! The one transition function every driver shares. Live play, replay, and
//! spectating all reproduce the same trajectory because they all go through
//! [`step`] and [`apply_event`] and nothing else.
//!
//! Never fails and never reads a clock. [`create_obstacle`] is the only
//! source of randomness, and its result is captured in the spawn event.

use crate::core::rng::DeterministicRng;
use crate::game::config::SimConfig;
use crate::game::events::EventPayload;
use crate::game::state::{Actor, Obstacle};

/// Advance exactly one frame.
///
/// Gravity is integrated into velocity, velocity into position. When the
/// actor would sink below ground it is snapped back and `vy` is set to
/// exactly `0.0`. Every obstacle shifts left by its own speed.
pub fn step(config: &SimConfig, actor: &mut Actor, obstacles: &mut [Obstacle]) {
    actor.vy += config.gravity;
    actor.y += actor.vy;

    let ground = config.ground_y();
    if actor.y > ground {
        actor.y = ground;
        actor.vy = 0.0;
    }

    for obstacle in obstacles.iter_mut() {
        obstacle.x -= obstacle.speed_or(config.obstacle_speed);
    }
}

/// Apply one event to the state.
///
/// - `Jump`: sets `vy` to the jump velocity only while grounded. An
///   airborne jump is a silent no-op (no double jump).
/// - `Spawn`: appends a copy of the payload obstacle; no payload, no-op.
/// - `Unknown`: ignored.
pub fn apply_event(
    config: &SimConfig,
    payload: &EventPayload,
    actor: &mut Actor,
    obstacles: &mut Vec<Obstacle>,
) {
    match payload {
        EventPayload::Jump { .. } => {
            if actor.is_grounded() {
                actor.vy = config.jump_velocity;
            }
        }
        EventPayload::Spawn(Some(obstacle)) => obstacles.push(*obstacle),
        EventPayload::Spawn(None) => {}
        EventPayload::Unknown { kind } => {
            tracing::trace!("Ignoring unknown event type {:?}", kind);
        }
    }
}

/// Create an obstacle at the right edge of the field.
///
/// Height is uniform in `[min_height, min_height + range)`. `speed` is the
/// horizontal speed to record in the spawn payload.
pub fn create_obstacle(config: &SimConfig, rng: &mut DeterministicRng, speed: f64) -> Obstacle {
    let min = config.obstacle_min_height;
    Obstacle {
        x: config.field_width,
        w: config.obstacle_width,
        h: rng.next_f64_range(min, min + config.obstacle_height_range),
        speed: Some(speed),
    }
}
