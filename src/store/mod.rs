//! Session and Event Store
//!
//! The durable append-only side of the system. Drivers never touch storage
//! directly: the live driver sends commands through a [`writer::StoreSink`],
//! replay and spectator drivers read through [`SessionStore`].
//!
//! ## Contract
//!
//! | Operation                    | Missing session | Not active    |
//! |------------------------------|-----------------|---------------|
//! | `create_session`             | creates         | duplicate ignored |
//! | `update_session_stage`       | no-op           | no-op         |
//! | `end_session`                | no-op           | no-op         |
//! | `append_event`               | ignored         | ignored       |
//! | `list_events_since`          | empty           | still listed  |

pub mod memory;
pub mod writer;

use std::fmt;
use std::future::Future;

use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::game::config::SimConfig;
use crate::game::events::{EventIdx, GameEvent};

pub use memory::InMemoryStore;
pub use writer::{spawn_store_writer, StoreCommand, StoreSink, WriterStats};

/// Opaque session token (a UUID string in practice).
pub type SessionId = String;

/// Default page size for `list_events_since`.
pub const DEFAULT_EVENTS_LIMIT: usize = 256;

/// Page size replay uses to fetch a whole log at once.
pub const REPLAY_FETCH_LIMIT: usize = 10_000;

/// Number of entries `top_scores` returns.
pub const TOP_SCORES_LIMIT: usize = 10;

/// Key under which a session's config records the physics it ran with.
pub const SIM_CONFIG_KEY: &str = "sim";

/// Session config written by the live driver.
pub fn session_config(sim: &SimConfig) -> Value {
    let mut config = serde_json::Map::new();
    config.insert(
        SIM_CONFIG_KEY.to_string(),
        serde_json::to_value(sim).unwrap_or(Value::Null),
    );
    Value::Object(config)
}

/// Authenticated principal that owns sessions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    /// Wrap an owner name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session lifecycle. `Active -> Done` is one-way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Being played; events may still be appended.
    Active,
    /// Finished; log and final score are immutable.
    Done,
}

/// One stored session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Opaque session token.
    pub session_id: SessionId,
    /// Who plays it.
    pub owner: OwnerId,
    /// Epoch milliseconds at creation.
    pub started_at: i64,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Current difficulty stage, when stage pacing is in use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<u32>,
    /// Game config as passed by the creator.
    #[serde(default)]
    pub config: Value,
    /// Set exactly once, on the transition to `Done`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<u64>,
}

impl SessionRecord {
    /// Check if the session can still accept events.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Physics the session was recorded with, if the creator stored them.
    pub fn sim_config(&self) -> Option<SimConfig> {
        self.config
            .get(SIM_CONFIG_KEY)
            .and_then(|sim| serde_json::from_value(sim.clone()).ok())
    }

    /// Final score, once the session is done.
    pub fn finished_score(&self) -> Option<u64> {
        match self.status {
            SessionStatus::Done => self.final_score,
            SessionStatus::Active => None,
        }
    }
}

/// Result of `create_session`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new record was written.
    Created,
    /// A record with this id already existed; nothing changed.
    DuplicateIgnored,
}

/// Store errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The caller has no identity.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Transient backend failure.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Storage contract shared by every driver.
///
/// Missing entities are `Ok(None)` or empty, never errors. Only
/// authorization and transient failures surface as [`StoreError`].
pub trait SessionStore: Send + Sync {
    /// Create a session. Idempotent on duplicate id.
    fn create_session(
        &self,
        session_id: &str,
        owner: Option<&OwnerId>,
        config: Value,
    ) -> impl Future<Output = Result<CreateOutcome, StoreError>> + Send;

    /// Record the current stage. No-op unless active and changed.
    fn update_session_stage(
        &self,
        session_id: &str,
        stage: u32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Mark the session done with its final score. No-op if missing or
    /// already done.
    fn end_session(
        &self,
        session_id: &str,
        final_score: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Append one event. Returns whether it was stored; events for
    /// sessions that are not active, and duplicate indices, are ignored.
    fn append_event(
        &self,
        event: GameEvent,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Events with `idx > after_idx`, ascending, at most `limit`.
    fn list_events_since(
        &self,
        session_id: &str,
        after_idx: EventIdx,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<GameEvent>, StoreError>> + Send;

    /// Fetch one session.
    fn get_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<SessionRecord>, StoreError>> + Send;

    /// Active sessions, oldest first.
    fn list_active_sessions(
        &self,
    ) -> impl Future<Output = Result<Vec<SessionRecord>, StoreError>> + Send;

    /// Best finished sessions, highest score first.
    fn top_scores(
        &self,
    ) -> impl Future<Output = Result<Vec<SessionRecord>, StoreError>> + Send;

    /// The owner's most recently started active session.
    fn latest_active_session_for(
        &self,
        owner: &OwnerId,
    ) -> impl Future<Output = Result<Option<SessionRecord>, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_shape() {
        let record = SessionRecord {
            session_id: "abc".into(),
            owner: OwnerId::new("rex"),
            started_at: 1_700_000_000_000,
            status: SessionStatus::Done,
            stage: None,
            config: Value::Null,
            final_score: Some(512),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["sessionId"], "abc");
        assert_eq!(value["owner"], "rex");
        assert_eq!(value["status"], "done");
        assert_eq!(value["finalScore"], 512);
        assert!(value.get("stage").is_none());

        let parsed: SessionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_sim_config_stored_under_key() {
        let sim = SimConfig { frame_rate: 30, ..Default::default() };
        let mut record = SessionRecord {
            session_id: "abc".into(),
            owner: OwnerId::new("rex"),
            started_at: 0,
            status: SessionStatus::Active,
            stage: None,
            config: session_config(&sim),
            final_score: None,
        };
        assert_eq!(record.config["sim"]["frame_rate"], 30);
        assert_eq!(record.sim_config(), Some(sim));

        // Opaque configs from other clients carry no physics
        record.config = serde_json::json!({ "theme": "neon" });
        assert_eq!(record.sim_config(), None);
        record.config = Value::Null;
        assert_eq!(record.sim_config(), None);
    }

    #[test]
    fn test_finished_score_requires_done() {
        let mut record = SessionRecord {
            session_id: "abc".into(),
            owner: OwnerId::new("rex"),
            started_at: 0,
            status: SessionStatus::Active,
            stage: None,
            config: Value::Null,
            final_score: Some(3),
        };
        assert_eq!(record.finished_score(), None);

        record.status = SessionStatus::Done;
        assert_eq!(record.finished_score(), Some(3));
    }
}
