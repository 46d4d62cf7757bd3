//! Collision Detection
//!
//! Axis-aligned overlap between the actor and obstacles. Obstacles stand on
//! the field floor, so their top edge is `field_height - h`.

use crate::game::config::SimConfig;
use crate::game::state::{Actor, Obstacle};

/// Check if the actor's box overlaps one obstacle.
#[inline]
pub fn overlaps(config: &SimConfig, actor: &Actor, obstacle: &Obstacle) -> bool {
    actor.x < obstacle.x + obstacle.w
        && actor.x + config.actor_width > obstacle.x
        && actor.y + config.actor_height > config.field_height - obstacle.h
}

/// Check the actor against every obstacle.
pub fn collides(config: &SimConfig, actor: &Actor, obstacles: &[Obstacle]) -> bool {
    obstacles.iter().any(|o| overlaps(config, actor, o))
}
