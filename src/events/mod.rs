//! Events emitted by the session controller on mode transitions.
//!
//! Broadcast so surrounding layers (status display, diagnostics) can follow
//! what the controller is doing without touching its state.

use serde::{Deserialize, Serialize};

use crate::controller::Mode;

/// Events emitted by the controller during transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// A guidance loop (visual/road/atm) started
    GuidanceStarted { mode: Mode },

    /// A guidance loop fully stopped
    GuidanceStopped {
        mode: Mode,
        /// Duration in milliseconds the loop was active
        duration_ms: u64,
    },

    /// Exam mode connected to a companion endpoint
    ExamConnected { endpoint: String },

    /// Exam mode disconnected
    ExamDisconnected { duration_ms: u64 },

    /// Translate mode performed one round trip
    TranslateStarted,

    /// Translate mode stopped
    TranslateStopped,

    /// Question mode preempted the active mode
    QuestionOpened { previous: Option<Mode> },

    /// Question mode finished and the previous mode was restored
    QuestionClosed { answered: bool },

    /// Companion pairing listener is up and waiting
    PairingStarted { address: String },

    /// Companion pairing completed with a peer
    PairingCompleted { endpoint: String },

    /// Companion pairing gave up without a peer
    PairingFailed,
}

impl std::fmt::Display for StateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateEvent::GuidanceStarted { mode } => write!(f, "GUIDANCE_STARTED ({mode})"),
            StateEvent::GuidanceStopped { mode, duration_ms } => {
                write!(f, "GUIDANCE_STOPPED ({mode}, {duration_ms}ms)")
            }
            StateEvent::ExamConnected { endpoint } => write!(f, "EXAM_CONNECTED ({endpoint})"),
            StateEvent::ExamDisconnected { duration_ms } => {
                write!(f, "EXAM_DISCONNECTED ({duration_ms}ms)")
            }
            StateEvent::TranslateStarted => write!(f, "TRANSLATE_STARTED"),
            StateEvent::TranslateStopped => write!(f, "TRANSLATE_STOPPED"),
            StateEvent::QuestionOpened { previous } => match previous {
                Some(mode) => write!(f, "QUESTION_OPENED (interrupting {mode})"),
                None => write!(f, "QUESTION_OPENED"),
            },
            StateEvent::QuestionClosed { answered } => {
                write!(f, "QUESTION_CLOSED (answered: {answered})")
            }
            StateEvent::PairingStarted { address } => write!(f, "PAIRING_STARTED ({address})"),
            StateEvent::PairingCompleted { endpoint } => {
                write!(f, "PAIRING_COMPLETED ({endpoint})")
            }
            StateEvent::PairingFailed => write!(f, "PAIRING_FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = StateEvent::GuidanceStopped {
            mode: Mode::Visual,
            duration_ms: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("guidance_stopped"));
        assert!(json.contains("visual"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"pairing_failed"}"#;
        let event: StateEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, StateEvent::PairingFailed));
    }
}
