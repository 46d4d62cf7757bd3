//! Live Driver
//!
//! Runs the kernel from local input at the host frame rate and is the only
//! writer of its session's event log.
//!
//! ```text
//!   Idle ──first jump──▶ Running ──collision──▶ Ended
//! ```
//!
//! Every recorded event is applied locally and queued for the store in the
//! same call, so the visible simulation and the log never diverge. Event
//! timestamps come from the session clock (`frames_stepped * frame_ms`),
//! which is what lets replay reproduce the run exactly.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::core::rng::DeterministicRng;
use crate::driver::{DriverInput, TracePoint};
use crate::game::collision;
use crate::game::config::{Pacing, PacingState, SimConfig};
use crate::game::events::{EventIdx, GameEvent};
use crate::game::kernel;
use crate::game::state::World;
use crate::store::{session_config, OwnerId, SessionId, StoreCommand, StoreSink};

/// Actor id written into jump events by a local player.
pub const LOCAL_ACTOR_ID: &str = "self";

/// Live session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LivePhase {
    /// Waiting for the first jump.
    Idle,
    /// Frames advance and events are recorded.
    Running,
    /// Terminal. No further events are emitted.
    Ended {
        /// Floor of the frame score at collision.
        final_score: u64,
    },
}

/// Real-time simulation driven by local input.
pub struct LiveDriver {
    config: SimConfig,
    pacing: Pacing,
    pacing_state: PacingState,
    owner: Option<OwnerId>,
    actor_id: String,
    session_id: SessionId,
    world: World,
    rng: DeterministicRng,
    next_idx: EventIdx,
    score: f64,
    phase: LivePhase,
    paused: bool,
    sink: StoreSink,
    trace: Vec<TracePoint>,
}

impl LiveDriver {
    /// Create an idle driver with a fresh session id.
    pub fn new(config: SimConfig, pacing: Pacing, owner: Option<OwnerId>, sink: StoreSink) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let world = World::new(&config);

        Self {
            rng: DeterministicRng::for_session(&session_id),
            config,
            pacing,
            pacing_state: PacingState::default(),
            owner,
            actor_id: LOCAL_ACTOR_ID.to_string(),
            session_id,
            world,
            next_idx: 1,
            score: 0.0,
            phase: LivePhase::Idle,
            paused: false,
            sink,
            trace: Vec::new(),
        }
    }

    /// Use a specific session id. Only meaningful before the session starts.
    pub fn with_session_id(mut self, session_id: impl Into<SessionId>) -> Self {
        if self.phase == LivePhase::Idle {
            self.session_id = session_id.into();
            self.rng = DeterministicRng::for_session(&self.session_id);
        }
        self
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    /// Handle a jump press. Returns whether a jump event was recorded.
    ///
    /// The first press starts the session. Presses while airborne, paused,
    /// or after the run ended record nothing.
    pub fn press_jump(&mut self) -> bool {
        if self.paused {
            return false;
        }

        match self.phase {
            LivePhase::Ended { .. } => return false,
            LivePhase::Idle => self.begin_session(),
            LivePhase::Running => {}
        }

        if !self.world.actor.is_grounded() {
            trace!("Jump ignored while airborne at frame {}", self.world.frame);
            return false;
        }

        let idx = self.take_idx();
        let event = GameEvent::jump(self.session_id.clone(), idx, self.clock_ms(), self.actor_id.clone());
        self.record(event);
        true
    }

    /// Stop advancing (window lost focus).
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume advancing.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    fn begin_session(&mut self) {
        info!("Starting session {}", self.session_id);
        self.sink.send(StoreCommand::CreateSession {
            session_id: self.session_id.clone(),
            owner: self.owner.clone(),
            config: session_config(&self.config),
        });
        self.phase = LivePhase::Running;
    }

    // =========================================================================
    // FRAME
    // =========================================================================

    /// Advance one frame.
    ///
    /// Order: pacing, spawn, kernel step, score, collision.
    pub fn frame(&mut self) -> LivePhase {
        if self.paused || self.phase != LivePhase::Running {
            return self.phase;
        }

        let elapsed = self.clock_ms();
        if let Some(stage) = self.pacing_state.advance(&self.pacing, elapsed) {
            debug!("Session {} reached stage {}", self.session_id, stage);
            self.sink.send(StoreCommand::UpdateStage {
                session_id: self.session_id.clone(),
                stage,
            });
        }

        let speed = self.current_speed();
        if self.spawn_due() {
            let obstacle = kernel::create_obstacle(&self.config, &mut self.rng, speed);
            let idx = self.take_idx();
            self.record(GameEvent::spawn(self.session_id.clone(), idx, elapsed, obstacle));
        }

        self.world.step(&self.config);
        self.score += speed;

        if collision::collides(&self.config, &self.world.actor, &self.world.obstacles) {
            let final_score = self.score.floor() as u64;
            info!(
                "Session {} ended at frame {} with score {}",
                self.session_id, self.world.frame, final_score
            );
            self.sink.send(StoreCommand::EndSession {
                session_id: self.session_id.clone(),
                final_score,
            });
            self.phase = LivePhase::Ended { final_score };
        }

        self.phase
    }

    fn spawn_due(&self) -> bool {
        let last_x = self
            .world
            .obstacles
            .last()
            .map(|o| o.x)
            .unwrap_or(f64::NEG_INFINITY);
        self.config.field_width - last_x >= self.pacing_state.gap_threshold(&self.pacing)
    }

    /// Apply locally and queue for the store as one unit.
    fn record(&mut self, event: GameEvent) {
        kernel::apply_event(&self.config, &event.payload, &mut self.world.actor, &mut self.world.obstacles);
        self.trace.push(TracePoint::capture(event.idx, &self.world));
        self.sink.send(StoreCommand::AppendEvent(event));
    }

    fn take_idx(&mut self) -> EventIdx {
        let idx = self.next_idx;
        self.next_idx += 1;
        idx
    }

    fn clock_ms(&self) -> f64 {
        self.config.elapsed_ms(self.world.frame)
    }

    // =========================================================================
    // RUN LOOP
    // =========================================================================

    /// Drive frames from a tokio interval until the run ends or the view
    /// closes. Returns the driver for inspection.
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<DriverInput>, period: Duration) -> Self {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut inputs_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let LivePhase::Ended { .. } = self.frame() {
                        break;
                    }
                    if !inputs_open && self.phase == LivePhase::Idle {
                        break;
                    }
                }
                input = inputs.recv(), if inputs_open => match input {
                    Some(DriverInput::Jump) => {
                        self.press_jump();
                    }
                    Some(DriverInput::Pause) => self.pause(),
                    Some(DriverInput::Resume) => self.resume(),
                    Some(DriverInput::Restart) => {}
                    Some(DriverInput::Close) => break,
                    None => inputs_open = false,
                },
            }
        }

        self
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Current phase.
    pub fn phase(&self) -> LivePhase {
        self.phase
    }

    /// Session id (assigned at construction, created in the store on start).
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Read-only world for rendering.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Running frame score.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Whether advancing is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of events recorded so far.
    pub fn events_recorded(&self) -> u64 {
        self.next_idx - 1
    }

    /// State snapshots taken after each recorded event.
    pub fn trace(&self) -> &[TracePoint] {
        &self.trace
    }

    /// Speed the next spawn would be recorded with.
    pub fn current_speed(&self) -> f64 {
        self.pacing_state.speed(&self.pacing, &self.config)
    }

    /// Frames until the nearest obstacle still ahead reaches the actor's
    /// front edge, at that obstacle's own speed.
    pub fn frames_to_next_obstacle(&self) -> Option<f64> {
        let front = self.world.actor.x + self.config.actor_width;
        self.world
            .obstacles
            .iter()
            .filter(|o| o.x >= front)
            .map(|o| (o.x - front) / o.speed_or(self.config.obstacle_speed))
            .min_by(|a, b| a.total_cmp(b))
    }
}
