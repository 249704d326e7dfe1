//! Core traits and types for the voice ledger
//!
//! This crate provides foundational types used across all other crates:
//! - Conversation states for market-sale tracking
//! - Transaction records and their normalization audit trail
//! - Collaborator traits (product vocabulary, transaction storage)
//! - Error types

pub mod conversation;
pub mod error;
pub mod traits;
pub mod transaction;
pub mod vocabulary;

pub use conversation::{ConversationState, SpeakerRole};
pub use error::{Error, Result};
pub use transaction::{NormalizationRecord, Transaction, TransactionData};
pub use vocabulary::InMemoryVocabulary;

// Trait re-exports
pub use traits::{Product, ProductVocabulary, TransactionSink};

/// Clamp a confidence score into the closed unit interval.
///
/// NaN collapses to 0.0 so that a broken score can never pass a threshold.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
