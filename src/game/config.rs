//! Simulation Configuration
//!
//! Every constant the kernel and drivers depend on travels in an explicitly
//! passed [`SimConfig`], so several simulations (one live run plus any number
//! of replays and spectated sessions) can share a process without cross-talk.

use serde::{Serialize, Deserialize};

/// Physics and geometry constants shared by the kernel and every driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Downward acceleration added to `vy` each frame.
    pub gravity: f64,
    /// Vertical velocity assigned by an accepted jump (negative is up).
    pub jump_velocity: f64,
    /// Default horizontal obstacle speed (px per frame).
    pub obstacle_speed: f64,
    /// Play field width; new obstacles appear at this x.
    pub field_width: f64,
    /// Play field height; obstacles stand on its bottom edge.
    pub field_height: f64,
    /// Fixed horizontal position of the actor.
    pub actor_x: f64,
    /// Actor bounding box width.
    pub actor_width: f64,
    /// Actor bounding box height.
    pub actor_height: f64,
    /// Width of every obstacle.
    pub obstacle_width: f64,
    /// Smallest obstacle height.
    pub obstacle_min_height: f64,
    /// Obstacle heights are drawn from `[min, min + range)`.
    pub obstacle_height_range: f64,
    /// Simulation frames per second; defines the session clock.
    pub frame_rate: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gravity: 0.8,
            jump_velocity: -15.0,
            obstacle_speed: 3.0,
            field_width: 800.0,
            field_height: 300.0,
            actor_x: 50.0,
            actor_width: 40.0,
            actor_height: 60.0,
            obstacle_width: 18.0,
            obstacle_min_height: 25.0,
            obstacle_height_range: 25.0,
            frame_rate: crate::DEFAULT_FRAME_RATE,
        }
    }
}

impl SimConfig {
    /// Resting `y` of the actor (top edge when standing on the ground).
    #[inline]
    pub fn ground_y(&self) -> f64 {
        self.field_height - self.actor_height
    }

    /// Duration of one frame in milliseconds.
    #[inline]
    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.frame_rate.max(1) as f64
    }

    /// Session clock after `frames` steps.
    ///
    /// The live driver stamps events with this value and the replay driver
    /// gates on it, so both must compute it the same way.
    #[inline]
    pub fn elapsed_ms(&self, frames: u64) -> f64 {
        frames as f64 * self.frame_ms()
    }
}

/// How the live driver paces difficulty.
///
/// Pacing only changes what the live driver *records* (spawn gap and the
/// speed written into each spawn payload); consumers never evaluate it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Pacing {
    /// Fixed spawn gap at the base obstacle speed.
    Constant {
        /// Minimum horizontal distance between spawns.
        gap: f64,
    },
    /// Difficulty ramps from 0 to 1; the gap shrinks and speed grows with it.
    Ramp {
        /// Spawn gap at difficulty 0.
        start_gap: f64,
        /// Spawn gap at difficulty 1.
        min_gap: f64,
        /// Difficulty added each running frame.
        ramp_per_frame: f64,
    },
    /// Discrete speed stages advanced by elapsed session time.
    Stages {
        /// Length of one stage in milliseconds.
        stage_ms: f64,
        /// Obstacle speed for each stage; the last one holds forever.
        speeds: Vec<f64>,
        /// Minimum horizontal distance between spawns.
        gap: f64,
    },
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Ramp {
            start_gap: 500.0,
            min_gap: 300.0,
            ramp_per_frame: 0.0005,
        }
    }
}

impl Pacing {
    /// Stage-based pacing with the stock stage table.
    pub fn stages() -> Self {
        Pacing::Stages {
            stage_ms: 10_000.0,
            speeds: vec![3.0, 4.0, 6.0, 8.0, 12.0],
            gap: 500.0,
        }
    }
}

/// Mutable pacing progress owned by one live driver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PacingState {
    /// Ramp progress in `[0, 1]`.
    pub difficulty: f64,
    /// Current stage index (stage pacing only).
    pub stage: u32,
}

impl PacingState {
    /// Advance one running frame. Returns the new stage when it changes.
    pub fn advance(&mut self, pacing: &Pacing, elapsed_ms: f64) -> Option<u32> {
        match pacing {
            Pacing::Constant { .. } => None,
            Pacing::Ramp { ramp_per_frame, .. } => {
                self.difficulty = (self.difficulty + ramp_per_frame).min(1.0);
                None
            }
            Pacing::Stages { stage_ms, speeds, .. } => {
                let last = speeds.len().saturating_sub(1) as u32;
                let stage = if *stage_ms > 0.0 {
                    ((elapsed_ms / stage_ms) as u32).min(last)
                } else {
                    last
                };
                if stage != self.stage {
                    self.stage = stage;
                    Some(stage)
                } else {
                    None
                }
            }
        }
    }

    /// Obstacle speed to record in the next spawn.
    pub fn speed(&self, pacing: &Pacing, config: &SimConfig) -> f64 {
        match pacing {
            Pacing::Constant { .. } => config.obstacle_speed,
            Pacing::Ramp { .. } => config.obstacle_speed * (1.0 + self.difficulty),
            Pacing::Stages { speeds, .. } => speeds
                .get(self.stage as usize)
                .copied()
                .unwrap_or(config.obstacle_speed),
        }
    }

    /// Distance from the right edge the last obstacle must clear before
    /// the next spawn.
    pub fn gap_threshold(&self, pacing: &Pacing) -> f64 {
        match pacing {
            Pacing::Constant { gap } | Pacing::Stages { gap, .. } => *gap,
            Pacing::Ramp { start_gap, min_gap, .. } => {
                start_gap - (start_gap - min_gap) * self.difficulty
            }
        }
    }
}
