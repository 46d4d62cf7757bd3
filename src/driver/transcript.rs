//! Session Transcript
//!
//! Everything needed to re-verify a finished session offline: the record,
//! the full log, the physics constants, and a state-hash checkpoint after
//! every applied event. Serialized as JSON.

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHash;
use crate::driver::replay::ReplayDriver;
use crate::game::config::SimConfig;
use crate::game::events::{EventIdx, GameEvent};
use crate::store::SessionRecord;

/// Current transcript version.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// World hash right after one event was applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Event index.
    pub idx: EventIdx,
    /// World hash after applying it.
    pub state_hash: StateHash,
}

/// Self-contained record of a finished session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionTranscript {
    /// Version for forward compatibility.
    pub version: u8,
    /// Physics constants the session ran under.
    pub config: SimConfig,
    /// The session record (carries the final score).
    pub session: SessionRecord,
    /// Normalized event log.
    pub events: Vec<GameEvent>,
    /// One checkpoint per applied event, in idx order.
    pub checkpoints: Vec<Checkpoint>,
    /// World hash when the replay finished.
    pub final_hash: StateHash,
}

impl SessionTranscript {
    /// Build a transcript by replaying the log once. Physics stored with
    /// the session take precedence over `config`.
    pub fn record(config: SimConfig, session: SessionRecord, events: Vec<GameEvent>) -> Self {
        let config = session.sim_config().unwrap_or(config);
        let (replay, checkpoints, final_hash) = replay_checkpoints(config.clone(), session.clone(), events);

        Self {
            version: TRANSCRIPT_VERSION,
            config,
            session,
            events: replay.events().to_vec(),
            checkpoints,
            final_hash,
        }
    }

    /// Replay the log and compare every checkpoint.
    pub fn verify(&self) -> Result<(), TranscriptError> {
        if self.version != TRANSCRIPT_VERSION {
            return Err(TranscriptError::UnsupportedVersion(self.version));
        }

        let (_, checkpoints, final_hash) =
            replay_checkpoints(self.config.clone(), self.session.clone(), self.events.clone());

        if checkpoints.len() != self.checkpoints.len() {
            return Err(TranscriptError::CheckpointCountMismatch {
                expected: self.checkpoints.len(),
                actual: checkpoints.len(),
            });
        }

        for (expected, actual) in self.checkpoints.iter().zip(&checkpoints) {
            if expected != actual {
                return Err(TranscriptError::CheckpointMismatch {
                    idx: expected.idx,
                    expected: hex::encode(expected.state_hash),
                    actual: hex::encode(actual.state_hash),
                });
            }
        }

        if final_hash != self.final_hash {
            return Err(TranscriptError::FinalStateMismatch);
        }

        Ok(())
    }

    /// Final score as recorded by the store.
    pub fn final_score(&self) -> Option<u64> {
        self.session.final_score
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, TranscriptError> {
        serde_json::to_string(self).map_err(|e| TranscriptError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, TranscriptError> {
        serde_json::from_str(json).map_err(|e| TranscriptError::Serialization(e.to_string()))
    }
}

fn replay_checkpoints(
    config: SimConfig,
    session: SessionRecord,
    events: Vec<GameEvent>,
) -> (ReplayDriver, Vec<Checkpoint>, StateHash) {
    let mut replay = ReplayDriver::new(config, session, events);
    replay.run_to_end();

    let checkpoints = replay
        .trace()
        .iter()
        .map(|point| Checkpoint {
            idx: point.idx,
            state_hash: point.state_hash,
        })
        .collect();
    let final_hash = replay.world().compute_hash();

    (replay, checkpoints, final_hash)
}

/// Transcript errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranscriptError {
    /// Written by a newer build.
    #[error("Unsupported transcript version {0}")]
    UnsupportedVersion(u8),

    /// Replay applied a different number of events.
    #[error("Checkpoint count mismatch: expected {expected}, got {actual}")]
    CheckpointCountMismatch {
        /// Checkpoints in the transcript.
        expected: usize,
        /// Checkpoints produced by replay.
        actual: usize,
    },

    /// State diverged after an event.
    #[error("Checkpoint mismatch at idx {idx}: expected {expected}, got {actual}")]
    CheckpointMismatch {
        /// Event where divergence was detected.
        idx: EventIdx,
        /// Recorded hash (hex).
        expected: String,
        /// Replayed hash (hex).
        actual: String,
    },

    /// Final world hash differs.
    #[error("Final state mismatch")]
    FinalStateMismatch,

    /// JSON encoding failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Obstacle;
    use crate::store::{OwnerId, SessionStatus};
    use serde_json::Value;

    fn transcript() -> SessionTranscript {
        let config = SimConfig::default();
        let session = SessionRecord {
            session_id: "t1".into(),
            owner: OwnerId::new("rex"),
            started_at: 1_700_000_000_000,
            status: SessionStatus::Done,
            stage: None,
            config: Value::Null,
            final_score: Some(640),
        };
        let events = vec![
            GameEvent::jump("t1", 1, 0.0, "self"),
            GameEvent::spawn("t1", 2, 0.0, Obstacle { speed: Some(3.0), ..Obstacle::new(800.0, 18.0, 31.0) }),
            GameEvent::jump("t1", 3, config.elapsed_ms(50), "self"),
        ];
        SessionTranscript::record(config, session, events)
    }

    #[test]
    fn test_record_and_verify() {
        let transcript = transcript();
        assert_eq!(transcript.checkpoints.len(), 3);
        assert_eq!(transcript.final_score(), Some(640));
        assert!(transcript.verify().is_ok());
    }

    #[test]
    fn test_json_survives_and_verifies() {
        let transcript = transcript();
        let json = transcript.to_json().unwrap();
        let parsed = SessionTranscript::from_json(&json).unwrap();

        assert_eq!(parsed, transcript);
        assert!(parsed.verify().is_ok());
    }

    #[test]
    fn test_tampered_event_detected() {
        let mut transcript = transcript();
        transcript.events[1] = GameEvent::spawn("t1", 2, 0.0, Obstacle::new(800.0, 18.0, 49.0));

        let result = transcript.verify();
        assert!(matches!(result, Err(TranscriptError::CheckpointMismatch { idx: 2, .. })));
    }

    #[test]
    fn test_dropped_event_detected() {
        let mut transcript = transcript();
        transcript.events.pop();

        assert!(matches!(
            transcript.verify(),
            Err(TranscriptError::CheckpointCountMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_version_checked() {
        let mut transcript = transcript();
        transcript.version = 99;
        assert_eq!(transcript.verify(), Err(TranscriptError::UnsupportedVersion(99)));
    }
}
