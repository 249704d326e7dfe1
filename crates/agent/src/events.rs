//! Events broadcast by the state machine

use serde::{Deserialize, Serialize};
use voice_ledger_core::{ConversationState, Transaction};

/// Why a session context was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    /// Sale closed and a transaction was emitted
    Completed,
    /// Customer or seller walked away
    Cancelled,
    /// No utterance within the session timeout
    Timeout,
    /// Reset requested by the caller
    Manual,
    /// Session reached `Complete` without both amount and product
    Incomplete,
}

/// Ledger event for listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Active state changed
    StateChanged {
        session_id: String,
        from: ConversationState,
        to: ConversationState,
        confidence: f32,
    },
    /// A sale was detected
    TransactionDetected(Transaction),
    /// Session context replaced by a fresh one
    SessionReset {
        session_id: String,
        reason: ResetReason,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tags() {
        let event = LedgerEvent::StateChanged {
            session_id: "s1".to_string(),
            from: ConversationState::Idle,
            to: ConversationState::Inquiry,
            confidence: 0.8,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["session_id"], "s1");

        let reset = LedgerEvent::SessionReset {
            session_id: "s1".to_string(),
            reason: ResetReason::Timeout,
        };
        let json = serde_json::to_value(&reset).unwrap();
        assert_eq!(json["type"], "session_reset");
        assert_eq!(json["reason"], "timeout");
    }
}
