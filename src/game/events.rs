//! Session Events
//!
//! The append-only log that replay and spectating re-drive the kernel from.
//! Each event is `(session_id, idx, t, type, data)`; `idx` is strictly
//! increasing per session starting at 1, and `t` is milliseconds on the
//! session clock.
//!
//! Wire shape (JSON):
//!
//! ```text
//! {"sessionId":"…","idx":3,"t":50.0,"type":"jump","data":{"actorId":"self"}}
//! {"sessionId":"…","idx":4,"t":66.6,"type":"spawn","data":{"x":800,"w":18,"h":31.2}}
//! ```
//!
//! Unknown `type` values decode to [`EventPayload::Unknown`] and are ignored
//! by the kernel.

use serde::{Serialize, Deserialize};
use serde_json::{json, Value};

use crate::game::state::Obstacle;

/// Per-session event index.
pub type EventIdx = u64;

/// Type-specific event data.
#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    /// The actor asked to jump.
    Jump {
        /// Who jumped.
        actor_id: String,
    },
    /// An obstacle entered the field. `None` when the payload was missing
    /// or malformed; applying it is a no-op.
    Spawn(Option<Obstacle>),
    /// A type this build does not understand.
    Unknown {
        /// The raw type tag.
        kind: String,
    },
}

impl EventPayload {
    /// Wire type tag.
    pub fn kind(&self) -> &str {
        match self {
            EventPayload::Jump { .. } => "jump",
            EventPayload::Spawn(_) => "spawn",
            EventPayload::Unknown { kind } => kind,
        }
    }
}

/// One immutable record in a session's event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEvent", into = "WireEvent")]
pub struct GameEvent {
    /// Owning session.
    pub session_id: String,
    /// Strictly increasing index within the session.
    pub idx: EventIdx,
    /// Milliseconds since session start (session clock).
    pub t: f64,
    /// What happened.
    pub payload: EventPayload,
}

impl GameEvent {
    /// Create a jump event.
    pub fn jump(session_id: impl Into<String>, idx: EventIdx, t: f64, actor_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            idx,
            t,
            payload: EventPayload::Jump { actor_id: actor_id.into() },
        }
    }

    /// Create a spawn event carrying the realized obstacle.
    pub fn spawn(session_id: impl Into<String>, idx: EventIdx, t: f64, obstacle: Obstacle) -> Self {
        Self {
            session_id: session_id.into(),
            idx,
            t,
            payload: EventPayload::Spawn(Some(obstacle)),
        }
    }
}

/// Sort a log by idx and drop duplicate indices (first occurrence wins).
///
/// Consumers call this before cursor consumption so array order never has to
/// equal idx order.
pub fn normalize_log(events: &mut Vec<GameEvent>) {
    events.sort_by_key(|e| e.idx);
    events.dedup_by_key(|e| e.idx);
    debug_assert!(is_strictly_ordered(events));
}

/// Check that indices strictly increase.
pub fn is_strictly_ordered(events: &[GameEvent]) -> bool {
    events.windows(2).all(|pair| pair[0].idx < pair[1].idx)
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    session_id: String,
    idx: EventIdx,
    t: f64,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl From<WireEvent> for GameEvent {
    fn from(wire: WireEvent) -> Self {
        let payload = match wire.kind.as_str() {
            "jump" => {
                // Older clients wrote `playerId`.
                let actor_id = wire
                    .data
                    .get("actorId")
                    .or_else(|| wire.data.get("playerId"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                EventPayload::Jump { actor_id }
            }
            "spawn" => {
                if wire.data.is_null() {
                    EventPayload::Spawn(None)
                } else {
                    EventPayload::Spawn(serde_json::from_value(wire.data).ok())
                }
            }
            _ => EventPayload::Unknown { kind: wire.kind },
        };

        Self {
            session_id: wire.session_id,
            idx: wire.idx,
            t: wire.t,
            payload,
        }
    }
}

impl From<GameEvent> for WireEvent {
    fn from(event: GameEvent) -> Self {
        let kind = event.payload.kind().to_string();
        let data = match event.payload {
            EventPayload::Jump { actor_id } => json!({ "actorId": actor_id }),
            EventPayload::Spawn(Some(obstacle)) => {
                serde_json::to_value(obstacle).unwrap_or(Value::Null)
            }
            EventPayload::Spawn(None) | EventPayload::Unknown { .. } => Value::Null,
        };

        Self {
            session_id: event.session_id,
            idx: event.idx,
            t: event.t,
            kind,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::DeterministicRng;
    use crate::game::config::SimConfig;

    #[test]
    fn test_jump_wire_shape() {
        let event = GameEvent::jump("s1", 1, 0.0, "self");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["idx"], 1);
        assert_eq!(value["type"], "jump");
        assert_eq!(value["data"], json!({ "actorId": "self" }));
    }

    #[test]
    fn test_spawn_wire_shape() {
        let event = GameEvent::spawn("s1", 2, 16.5, Obstacle::new(800.0, 18.0, 33.0));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "spawn");
        assert_eq!(value["data"], json!({ "x": 800.0, "w": 18.0, "h": 33.0 }));

        let parsed: GameEvent = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_legacy_player_id_accepted() {
        let json = r#"{"sessionId":"s","idx":1,"t":0,"type":"jump","data":{"playerId":"self"}}"#;
        let event: GameEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.payload, EventPayload::Jump { actor_id: "self".into() });
    }

    #[test]
    fn test_unknown_type_decodes() {
        let json = r#"{"sessionId":"s","idx":9,"t":1.5,"type":"duck","data":{"depth":3}}"#;
        let event: GameEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.payload, EventPayload::Unknown { kind: "duck".into() });
        assert_eq!(event.idx, 9);
    }

    #[test]
    fn test_spawn_without_data() {
        let json = r#"{"sessionId":"s","idx":2,"t":0,"type":"spawn"}"#;
        let event: GameEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.payload, EventPayload::Spawn(None));

        let malformed = r#"{"sessionId":"s","idx":2,"t":0,"type":"spawn","data":{"x":"far"}}"#;
        let event: GameEvent = serde_json::from_str(malformed).unwrap();
        assert_eq!(event.payload, EventPayload::Spawn(None));
    }

    #[test]
    fn test_full_precision_floats_survive_json() {
        let config = SimConfig::default();
        let mut rng = DeterministicRng::new(99);

        let mut shapes = vec![Obstacle::new(800.0, 18.0, 28.594247548436922)];
        for _ in 0..2_000 {
            shapes.push(Obstacle {
                speed: Some(config.obstacle_speed * (1.0 + rng.next_f64())),
                ..Obstacle::new(800.0, 18.0, rng.next_f64_range(25.0, 50.0))
            });
        }

        for (i, shape) in shapes.into_iter().enumerate() {
            let idx = i as EventIdx + 1;
            let event = GameEvent::spawn("s", idx, config.elapsed_ms(idx * 7), shape);
            let parsed: GameEvent = serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();

            assert_eq!(parsed.t.to_bits(), event.t.to_bits(), "t drifted at idx {}", idx);
            let EventPayload::Spawn(Some(back)) = parsed.payload else {
                panic!("spawn lost its payload at idx {}", idx);
            };
            assert_eq!(back.h.to_bits(), shape.h.to_bits(), "h drifted at idx {}", idx);
            assert_eq!(back.speed.map(f64::to_bits), shape.speed.map(f64::to_bits));
        }
    }

    #[test]
    fn test_normalize_log() {
        let mut log = vec![
            GameEvent::jump("s", 3, 30.0, "a"),
            GameEvent::jump("s", 1, 10.0, "a"),
            GameEvent::jump("s", 3, 99.0, "dup"),
            GameEvent::jump("s", 2, 20.0, "a"),
        ];
        assert!(!is_strictly_ordered(&log));

        normalize_log(&mut log);

        assert!(is_strictly_ordered(&log));
        assert_eq!(log.iter().map(|e| e.idx).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(log[2].t, 30.0);
    }
}
