//! In-Memory Store
//!
//! A [`SessionStore`] backed by ordered maps behind a tokio `RwLock`.
//! Events are keyed by idx so listing is always ascending and duplicate
//! indices cannot exist.

use std::collections::BTreeMap;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::game::events::{EventIdx, GameEvent};
use crate::store::{
    CreateOutcome, OwnerId, SessionId, SessionRecord, SessionStatus, SessionStore, StoreError,
    TOP_SCORES_LIMIT,
};

/// A session and its log.
#[derive(Debug)]
struct StoredSession {
    record: SessionRecord,
    events: BTreeMap<EventIdx, GameEvent>,
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<BTreeMap<SessionId, StoredSession>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions held.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of events stored for a session.
    pub async fn event_count(&self, session_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.events.len())
            .unwrap_or(0)
    }
}

impl SessionStore for InMemoryStore {
    async fn create_session(
        &self,
        session_id: &str,
        owner: Option<&OwnerId>,
        config: Value,
    ) -> Result<CreateOutcome, StoreError> {
        let owner = owner.ok_or(StoreError::Unauthenticated)?;

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            debug!("Session {} already exists, ignoring create", session_id);
            return Ok(CreateOutcome::DuplicateIgnored);
        }

        sessions.insert(
            session_id.to_string(),
            StoredSession {
                record: SessionRecord {
                    session_id: session_id.to_string(),
                    owner: owner.clone(),
                    started_at: chrono::Utc::now().timestamp_millis(),
                    status: SessionStatus::Active,
                    stage: None,
                    config,
                    final_score: None,
                },
                events: BTreeMap::new(),
            },
        );

        Ok(CreateOutcome::Created)
    }

    async fn update_session_stage(&self, session_id: &str, stage: u32) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            if session.record.is_active() && session.record.stage != Some(stage) {
                session.record.stage = Some(stage);
            }
        }
        Ok(())
    }

    async fn end_session(&self, session_id: &str, final_score: u64) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) if session.record.is_active() => {
                session.record.status = SessionStatus::Done;
                session.record.final_score = Some(final_score);
            }
            Some(_) => debug!("Session {} already done, ignoring end", session_id),
            None => debug!("Session {} not found, ignoring end", session_id),
        }
        Ok(())
    }

    async fn append_event(&self, event: GameEvent) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&event.session_id) else {
            return Ok(false);
        };
        if !session.record.is_active() || session.events.contains_key(&event.idx) {
            return Ok(false);
        }
        session.events.insert(event.idx, event);
        Ok(true)
    }

    async fn list_events_since(
        &self,
        session_id: &str,
        after_idx: EventIdx,
        limit: usize,
    ) -> Result<Vec<GameEvent>, StoreError> {
        let sessions = self.sessions.read().await;
        let events = sessions
            .get(session_id)
            .map(|s| {
                s.events
                    .range(after_idx.saturating_add(1)..)
                    .take(limit)
                    .map(|(_, e)| e.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(events)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.read().await.get(session_id).map(|s| s.record.clone()))
    }

    async fn list_active_sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut active: Vec<SessionRecord> = sessions
            .values()
            .filter(|s| s.record.is_active())
            .map(|s| s.record.clone())
            .collect();
        active.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(active)
    }

    async fn top_scores(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut done: Vec<SessionRecord> = sessions
            .values()
            .filter(|s| s.record.finished_score().is_some())
            .map(|s| s.record.clone())
            .collect();
        done.sort_by(|a, b| {
            b.final_score
                .cmp(&a.final_score)
                .then_with(|| a.started_at.cmp(&b.started_at))
        });
        done.truncate(TOP_SCORES_LIMIT);
        Ok(done)
    }

    async fn latest_active_session_for(
        &self,
        owner: &OwnerId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.record.is_active() && &s.record.owner == owner)
            .max_by(|a, b| {
                a.record
                    .started_at
                    .cmp(&b.record.started_at)
                    .then_with(|| a.record.session_id.cmp(&b.record.session_id))
            })
            .map(|s| s.record.clone()))
    }
}
