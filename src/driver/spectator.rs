//! Spectator Driver
//!
//! Follows a session that is still being played. Batches fetched with
//! `list_events_since(watermark)` are buffered by idx; each frame applies
//! everything buffered and then steps once. There is no synthetic clock,
//! so a spectator trails the live player by roughly one poll interval.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::driver::{DriverInput, TracePoint};
use crate::game::config::SimConfig;
use crate::game::events::{EventIdx, GameEvent};
use crate::game::kernel;
use crate::game::state::World;
use crate::store::{OwnerId, SessionId, SessionRecord, SessionStore, StoreError, DEFAULT_EVENTS_LIMIT};

/// Consecutive polls without a session record before spectating gives up.
pub const MISSING_SESSION_POLL_LIMIT: u32 = 100;

/// Incremental consumer of a growing log.
pub struct SpectatorDriver {
    config: SimConfig,
    session_id: SessionId,
    world: World,
    pending: BTreeMap<EventIdx, GameEvent>,
    applied_idx: EventIdx,
    watermark: EventIdx,
    final_score: Option<u64>,
    paused: bool,
    missing_polls: u32,
    abandoned: bool,
    trace: Vec<TracePoint>,
}

impl SpectatorDriver {
    /// Start spectating a session from its beginning.
    pub fn new(config: SimConfig, session_id: impl Into<SessionId>) -> Self {
        let world = World::new(&config);
        Self {
            config,
            session_id: session_id.into(),
            world,
            pending: BTreeMap::new(),
            applied_idx: 0,
            watermark: 0,
            final_score: None,
            paused: false,
            missing_polls: 0,
            abandoned: false,
            trace: Vec::new(),
        }
    }

    /// Spectate the owner's most recent active session, if any.
    ///
    /// Physics stored with the session take precedence over `config`.
    #[instrument(skip(store, config))]
    pub async fn watch_user<S: SessionStore>(
        store: &S,
        config: SimConfig,
        owner: &OwnerId,
    ) -> Result<Option<Self>, StoreError> {
        let session = store.latest_active_session_for(owner).await?;
        Ok(session.map(|record| {
            info!("Watching session {}", record.session_id);
            let config = record.sim_config().unwrap_or(config);
            Self::new(config, record.session_id)
        }))
    }

    /// Buffer a batch. Returns how many events were newly buffered.
    ///
    /// Events already applied, already buffered, or for another session
    /// are dropped. Arrival order within and across batches is irrelevant
    /// as long as an event arrives before the frame that would pass it.
    pub fn ingest(&mut self, batch: impl IntoIterator<Item = GameEvent>) -> usize {
        let mut accepted = 0;
        for event in batch {
            if event.session_id != self.session_id || event.idx <= self.applied_idx {
                continue;
            }
            self.watermark = self.watermark.max(event.idx);
            if let std::collections::btree_map::Entry::Vacant(slot) = self.pending.entry(event.idx) {
                slot.insert(event);
                accepted += 1;
            }
        }
        accepted
    }

    /// Look at the latest session record. A finished session with a final
    /// score ends spectating.
    pub fn observe_session(&mut self, record: Option<&SessionRecord>) {
        if self.final_score.is_some() {
            return;
        }
        if let Some(score) = record.and_then(SessionRecord::finished_score) {
            info!("Session {} finished with score {}", self.session_id, score);
            self.final_score = Some(score);
        }
    }

    /// Advance one frame. Returns `true` once the session is over and every
    /// buffered event has been applied.
    pub fn frame(&mut self) -> bool {
        if self.is_finished() || self.paused {
            return self.is_finished();
        }

        while let Some((idx, event)) = self.pending.pop_first() {
            kernel::apply_event(&self.config, &event.payload, &mut self.world.actor, &mut self.world.obstacles);
            self.applied_idx = idx;
            self.trace.push(TracePoint::capture(idx, &self.world));
        }

        self.world.step(&self.config);
        self.is_finished()
    }

    /// One poll against the store: read the session record, then every
    /// event past the watermark. The session is only treated as finished
    /// once a poll comes back short, so the tail of the log is never
    /// skipped.
    pub async fn poll<S: SessionStore>(&mut self, store: &S) -> Result<usize, StoreError> {
        let record = store.get_session(&self.session_id).await?;
        let batch = store
            .list_events_since(&self.session_id, self.watermark, DEFAULT_EVENTS_LIMIT)
            .await?;
        let caught_up = batch.len() < DEFAULT_EVENTS_LIMIT;
        let accepted = self.ingest(batch);

        if accepted > 0 {
            debug!("Buffered {} events up to idx {}", accepted, self.watermark);
        }
        if record.is_some() {
            self.missing_polls = 0;
        } else {
            self.missing_polls += 1;
            if self.missing_polls >= MISSING_SESSION_POLL_LIMIT && !self.abandoned {
                warn!(
                    "Session {} not found after {} polls, giving up",
                    self.session_id, self.missing_polls
                );
                self.abandoned = true;
            }
        }
        if caught_up {
            self.observe_session(record.as_ref());
        }
        Ok(accepted)
    }

    /// Stop advancing. Polling continues so nothing is missed.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume advancing; buffered events are applied on the next frame.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Poll and render until the session finishes or the view closes.
    ///
    /// Store errors are logged and retried on the next poll tick.
    pub async fn run<S: SessionStore>(
        mut self,
        store: Arc<S>,
        mut inputs: mpsc::UnboundedReceiver<DriverInput>,
        frame_period: Duration,
        poll_period: Duration,
    ) -> Self {
        let mut frames = tokio::time::interval(frame_period);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut polls = tokio::time::interval(poll_period);
        polls.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.is_finished() {
            tokio::select! {
                _ = frames.tick() => {
                    self.frame();
                }
                _ = polls.tick() => {
                    if let Err(e) = self.poll(store.as_ref()).await {
                        warn!("Spectator poll for {} failed: {}", self.session_id, e);
                    }
                }
                input = inputs.recv() => match input {
                    Some(DriverInput::Pause) => self.pause(),
                    Some(DriverInput::Resume) => self.resume(),
                    Some(DriverInput::Jump) | Some(DriverInput::Restart) => {}
                    Some(DriverInput::Close) | None => break,
                },
            }
        }

        self
    }

    /// Session being watched.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Read-only world for rendering.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Highest idx received; the next poll's lower bound.
    pub fn watermark(&self) -> EventIdx {
        self.watermark
    }

    /// Highest idx applied to the world.
    pub fn applied_idx(&self) -> EventIdx {
        self.applied_idx
    }

    /// Events buffered but not yet applied.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Final score once the session is done.
    pub fn final_score(&self) -> Option<u64> {
        self.final_score
    }

    /// Whether the session never appeared in the store.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Whether the watched session is over and fully applied, or never
    /// appeared.
    pub fn is_finished(&self) -> bool {
        self.abandoned || (self.final_score.is_some() && self.pending.is_empty())
    }

    /// State snapshots taken after each applied event.
    pub fn trace(&self) -> &[TracePoint] {
        &self.trace
    }
}
