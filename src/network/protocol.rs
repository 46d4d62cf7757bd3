//! Protocol Messages
//!
//! Wire format for the store gateway over WebSocket. All messages are JSON
//! objects tagged by `type`.

use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::game::events::{EventIdx, GameEvent};
use crate::store::{SessionRecord, DEFAULT_EVENTS_LIMIT};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identify the connection. Required before any mutation.
    Hello {
        /// Owner name sessions will be attributed to.
        owner: String,
    },

    /// Create a session owned by the caller.
    StartSession {
        /// Client-generated session id.
        session_id: String,
        /// Opaque game config stored with the record.
        #[serde(default)]
        config: Value,
    },

    /// Report a stage change.
    UpdateStage {
        /// Target session.
        session_id: String,
        /// New stage.
        stage: u32,
    },

    /// Mark a session done.
    EndSession {
        /// Target session.
        session_id: String,
        /// Final score.
        final_score: u64,
    },

    /// Append one event.
    LogEvent {
        /// The event.
        event: GameEvent,
    },

    /// Fetch a session record.
    GetSession {
        /// Session to fetch.
        session_id: String,
    },

    /// Fetch events past a watermark.
    EventsSince {
        /// Session to read.
        session_id: String,
        /// Exclusive lower bound.
        #[serde(default)]
        after_idx: EventIdx,
        /// Page size.
        #[serde(default = "default_events_limit")]
        limit: usize,
    },

    /// List sessions being played.
    ListActiveSessions,

    /// Best finished sessions.
    TopScores,

    /// Resolve a user's current session.
    WatchUser {
        /// Owner to follow.
        owner: String,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

fn default_events_limit() -> usize {
    DEFAULT_EVENTS_LIMIT
}

impl ClientMessage {
    /// Whether this message writes to the store.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ClientMessage::StartSession { .. }
                | ClientMessage::UpdateStage { .. }
                | ClientMessage::EndSession { .. }
                | ClientMessage::LogEvent { .. }
        )
    }

    /// Short name for logs and acks.
    pub fn op(&self) -> &'static str {
        match self {
            ClientMessage::Hello { .. } => "hello",
            ClientMessage::StartSession { .. } => "start_session",
            ClientMessage::UpdateStage { .. } => "update_stage",
            ClientMessage::EndSession { .. } => "end_session",
            ClientMessage::LogEvent { .. } => "log_event",
            ClientMessage::GetSession { .. } => "get_session",
            ClientMessage::EventsSince { .. } => "events_since",
            ClientMessage::ListActiveSessions => "list_active_sessions",
            ClientMessage::TopScores => "top_scores",
            ClientMessage::WatchUser { .. } => "watch_user",
            ClientMessage::Ping { .. } => "ping",
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from gateway to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `hello`.
    Welcome {
        /// Gateway version.
        version: String,
        /// Owner the connection is now bound to.
        owner: String,
    },

    /// Mutation accepted.
    Ack {
        /// Operation name.
        op: String,
        /// Whether the store changed (false for ignored duplicates).
        applied: bool,
    },

    /// A session record, or `None` if missing.
    Session {
        /// The record.
        session: Option<SessionRecord>,
    },

    /// A page of events.
    Events {
        /// Session the events belong to.
        session_id: String,
        /// Ascending by idx.
        events: Vec<GameEvent>,
        /// Highest idx in this page, or the request's `after_idx` if empty.
        watermark: EventIdx,
    },

    /// A list of session records.
    Sessions {
        /// The records.
        sessions: Vec<SessionRecord>,
    },

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server time (epoch ms).
        server_time: i64,
    },

    /// Request failed.
    Error(ServerError),

    /// Gateway is shutting down.
    Shutdown {
        /// Reason.
        reason: String,
    },
}

impl ServerMessage {
    /// Build an error reply.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError {
            code,
            message: message.into(),
        })
    }
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Not authenticated.
    NotAuthenticated,
    /// Caller does not own the session.
    NotOwner,
    /// Invalid input.
    InvalidInput,
    /// Store temporarily unavailable.
    Unavailable,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
