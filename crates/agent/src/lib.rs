//! Conversational sale tracking for the voice ledger
//!
//! Features:
//! - Conversation state machine that follows a sale from inquiry to payment
//!   and emits a `Transaction` when it closes
//! - Extraction coordinator for one-shot transcripts with caching, business
//!   validation and correction learning
//! - Broadcast events for UI and storage listeners

pub mod events;
pub mod extraction;
pub mod session;
pub mod state_machine;

pub use events::{LedgerEvent, ResetReason};
pub use extraction::{
    BusinessIssue, BusinessValidationResult, CacheStats, CorrectionType, ExtractionCache,
    ExtractionCoordinator, IssueSeverity, ProcessingResult, RecommendedAction,
};
pub use session::{ConversationContext, StateTransition};
pub use state_machine::ConversationStateMachine;

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Text processing error: {0}")]
    TextProcessing(#[from] voice_ledger_text_processing::TextProcessingError),

    #[error("Invalid correction: {0}")]
    InvalidCorrection(String),

    #[error("Task failed: {0}")]
    Task(String),
}

impl From<voice_ledger_core::Error> for AgentError {
    fn from(err: voice_ledger_core::Error) -> Self {
        match err {
            voice_ledger_core::Error::Storage(msg) => AgentError::Storage(msg),
            other => AgentError::Vocabulary(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
