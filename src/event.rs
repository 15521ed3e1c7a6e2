//! Structured engine events.
//!
//! Events are the observation surface for external collaborators (state
//! container, UI): every mechanical outcome is emitted as an [`EngineEvent`]
//! with a serializable payload. Narration additionally flows through the
//! `log` facade, but events, not log lines, are authoritative.

use serde::{Deserialize, Serialize};

/// Mechanical event kind emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    GameStarted,
    TurnStarted,
    DiceRolled,
    ResolutionApplied,
    ZoneEntered,
    ZoneVacated,
    PlayerEliminated,
    YieldPromptsCreated,
    YieldDecisionRecorded,
    YieldFlowComplete,
    YieldFlowPartial,
    PhaseChanged,
    PhaseChangeRejected,
    PhaseChangeDeferred,
    PhaseChangeSkipped,
    StaleTaskDropped,
    StartRetryForced,
    DriftDetected,
    VictoryDeclared,
}

/// Severity tier for an engine event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Warning,
}

/// Structured event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Monotonic sequence number within the match.
    pub seq: u64,
    /// Turn epoch active when the event fired.
    pub turn_cycle_id: u64,
    pub kind: EventKind,
    pub severity: EventSeverity,
    /// Structured payload for downstream rendering and debugging.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_roundtrips_through_json() {
        let event = EngineEvent {
            seq: 12,
            turn_cycle_id: 3,
            kind: EventKind::DiceRolled,
            severity: EventSeverity::Info,
            payload: serde_json::json!({ "roll_index": 1 }),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let restored: EngineEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, event);
    }

    #[test]
    fn null_payload_is_omitted() {
        let event = EngineEvent {
            seq: 0,
            turn_cycle_id: 0,
            kind: EventKind::GameStarted,
            severity: EventSeverity::Info,
            payload: serde_json::Value::Null,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(!json.contains("payload"));
    }
}
