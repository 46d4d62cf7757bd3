//! Store Writer Task
//!
//! Fire-and-forget persistence for the live driver. Commands go into an
//! unbounded channel and a single task applies them in order, so a frame
//! never awaits the store and a failing store never stops the game.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::game::events::GameEvent;
use crate::store::{OwnerId, SessionId, SessionStore};

/// A write destined for the store.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreCommand {
    /// Create the session record.
    CreateSession {
        /// New session id.
        session_id: SessionId,
        /// Owner, if signed in.
        owner: Option<OwnerId>,
        /// Creator's game config.
        config: Value,
    },
    /// Report a stage change.
    UpdateStage {
        /// Target session.
        session_id: SessionId,
        /// New stage.
        stage: u32,
    },
    /// Mark the session done.
    EndSession {
        /// Target session.
        session_id: SessionId,
        /// Floor of the frame score.
        final_score: u64,
    },
    /// Append one event.
    AppendEvent(GameEvent),
}

/// Sending half handed to the live driver.
#[derive(Clone, Debug)]
pub struct StoreSink {
    tx: mpsc::UnboundedSender<StoreCommand>,
}

impl StoreSink {
    /// Create a sink and its receiving end without a writer task.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StoreCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a command. Never blocks; a closed channel is logged and dropped.
    pub fn send(&self, command: StoreCommand) {
        if let Err(e) = self.tx.send(command) {
            debug!("Store writer gone, dropping {:?}", e.0);
        }
    }

    /// Sink whose commands go nowhere.
    pub fn disconnected() -> Self {
        let (sink, _) = Self::channel();
        sink
    }
}

/// What the writer did before its channel closed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Commands the store accepted.
    pub applied: u64,
    /// Commands that failed and were dropped.
    pub failed: u64,
}

/// Spawn the writer task. It runs until every [`StoreSink`] clone is dropped.
pub fn spawn_store_writer<S>(store: Arc<S>) -> (StoreSink, JoinHandle<WriterStats>)
where
    S: SessionStore + 'static,
{
    let (sink, rx) = StoreSink::channel();
    let handle = tokio::spawn(run_writer(store, rx));
    (sink, handle)
}

async fn run_writer<S: SessionStore>(
    store: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<StoreCommand>,
) -> WriterStats {
    let mut stats = WriterStats::default();

    while let Some(command) = rx.recv().await {
        match apply(store.as_ref(), command).await {
            Ok(()) => stats.applied += 1,
            Err(e) => {
                warn!("Store write failed: {}", e);
                stats.failed += 1;
            }
        }
    }

    info!("Store writer stopped: {} applied, {} failed", stats.applied, stats.failed);
    stats
}

async fn apply<S: SessionStore>(store: &S, command: StoreCommand) -> Result<(), crate::store::StoreError> {
    match command {
        StoreCommand::CreateSession { session_id, owner, config } => {
            store.create_session(&session_id, owner.as_ref(), config).await?;
        }
        StoreCommand::UpdateStage { session_id, stage } => {
            store.update_session_stage(&session_id, stage).await?;
        }
        StoreCommand::EndSession { session_id, final_score } => {
            store.end_session(&session_id, final_score).await?;
        }
        StoreCommand::AppendEvent(event) => {
            let idx = event.idx;
            if !store.append_event(event).await? {
                debug!("Event {} not stored", idx);
            }
        }
    }
    Ok(())
}
