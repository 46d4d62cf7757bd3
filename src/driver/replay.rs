//! Replay Driver
//!
//! Re-runs a finished session from its complete log. Each frame applies
//! every unconsumed event whose timestamp is at or before the synthetic
//! session clock, then steps once. The replay ends when the cursor runs out
//! and shows the score the store recorded, not a recomputed one.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

use crate::driver::{DriverInput, TracePoint};
use crate::game::config::SimConfig;
use crate::game::events::{normalize_log, GameEvent};
use crate::game::kernel;
use crate::game::state::World;
use crate::store::{SessionRecord, SessionStore, StoreError, REPLAY_FETCH_LIMIT};

/// Synthetic-clock playback of a finished log.
pub struct ReplayDriver {
    config: SimConfig,
    session: SessionRecord,
    events: Vec<GameEvent>,
    cursor: usize,
    world: World,
    finished: bool,
    paused: bool,
    trace: Vec<TracePoint>,
}

impl ReplayDriver {
    /// Create a replay over `events`. The log is sorted by idx and
    /// de-duplicated first.
    pub fn new(config: SimConfig, session: SessionRecord, mut events: Vec<GameEvent>) -> Self {
        normalize_log(&mut events);
        let world = World::new(&config);

        Self {
            config,
            session,
            events,
            cursor: 0,
            world,
            finished: false,
            paused: false,
            trace: Vec::new(),
        }
    }

    /// Fetch a session and its whole log in one call.
    ///
    /// Physics stored with the session take precedence over `config`, so
    /// events are gated on the clock they were recorded with. Returns
    /// `Ok(None)` if the session does not exist.
    #[instrument(skip(store, config))]
    pub async fn load<S: SessionStore>(
        store: &S,
        config: SimConfig,
        session_id: &str,
    ) -> Result<Option<Self>, StoreError> {
        let Some(session) = store.get_session(session_id).await? else {
            return Ok(None);
        };
        let events = store.list_events_since(session_id, 0, REPLAY_FETCH_LIMIT).await?;
        info!("Loaded {} events for replay", events.len());

        let config = match session.sim_config() {
            Some(recorded) => {
                if recorded != config {
                    debug!("Using recorded physics at {} Hz", recorded.frame_rate);
                }
                recorded
            }
            None => config,
        };
        Ok(Some(Self::new(config, session, events)))
    }

    /// Advance one frame. Returns `true` once the replay is finished.
    pub fn frame(&mut self) -> bool {
        if self.finished || self.paused {
            return self.finished;
        }

        let elapsed = self.config.elapsed_ms(self.world.frame);
        while let Some(event) = self.events.get(self.cursor) {
            if event.t > elapsed {
                break;
            }
            kernel::apply_event(&self.config, &event.payload, &mut self.world.actor, &mut self.world.obstacles);
            self.trace.push(TracePoint::capture(event.idx, &self.world));
            self.cursor += 1;
        }

        self.world.step(&self.config);

        if self.cursor >= self.events.len() {
            debug!("Replay of {} finished at frame {}", self.session.session_id, self.world.frame);
            self.finished = true;
        }
        self.finished
    }

    /// Run frames until finished. Returns the number of frames stepped.
    pub fn run_to_end(&mut self) -> u64 {
        let paused = std::mem::replace(&mut self.paused, false);
        while !self.frame() {}
        self.paused = paused;
        self.world.frame
    }

    /// Rewind to the beginning. The next run is identical to the first.
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.world.reset(&self.config);
        self.finished = false;
        self.trace.clear();
    }

    /// Stop advancing.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume advancing.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Play at the given frame period until finished or closed.
    ///
    /// The finished replay stays open for `Restart` until `Close` arrives
    /// or the input channel closes.
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<DriverInput>, period: Duration) -> Self {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick(), if !self.finished => {
                    self.frame();
                }
                input = inputs.recv() => match input {
                    Some(DriverInput::Pause) => self.pause(),
                    Some(DriverInput::Resume) => self.resume(),
                    Some(DriverInput::Restart) => self.restart(),
                    Some(DriverInput::Jump) => {}
                    Some(DriverInput::Close) | None => break,
                },
            }
        }

        self
    }

    /// Read-only world for rendering.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The session being replayed.
    pub fn session(&self) -> &SessionRecord {
        &self.session
    }

    /// Normalized log.
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Whether the cursor has been exhausted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Score to show once finished: the one the store recorded.
    pub fn final_score(&self) -> Option<u64> {
        if self.finished {
            self.session.final_score
        } else {
            None
        }
    }

    /// Number of events applied so far.
    pub fn applied(&self) -> usize {
        self.cursor
    }

    /// State snapshots taken after each applied event.
    pub fn trace(&self) -> &[TracePoint] {
        &self.trace
    }
}
