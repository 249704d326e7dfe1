//! Text Processing for the Voice Ledger
//!
//! This crate turns transcribed market speech into scored intents and
//! canonical entities:
//! - **Pattern Matching**: score utterances against sale intents (inquiry,
//!   quote, negotiation, agreement, payment, cancellation) and pull out raw
//!   amounts, products and quantities
//! - **Entity Normalization**: convert raw values to the canonical currency,
//!   product vocabulary and unit names
//! - **Number Words**: English and Twi spoken numbers
//! - **Redaction**: mask phone numbers in transcript snippets
//!
//! # Example
//!
//! ```
//! use voice_ledger_text_processing::{EntityNormalizer, PatternMatcher};
//!
//! let matcher = PatternMatcher::new();
//! let normalizer = EntityNormalizer::new();
//!
//! let entities = matcher.extract_entities("give me 2 bowls of gari for 10 cedis");
//! let normalized = normalizer.normalize_entities(&entities);
//!
//! assert_eq!(normalized.amount.unwrap().value, 10.0);
//! assert_eq!(normalized.product.unwrap().name, "Gari");
//! ```

pub mod normalization;
pub mod numbers;
pub mod patterns;
pub mod redaction;
pub mod text;

mod error;

pub use error::{Result, TextProcessingError};

pub use normalization::{
    EntityNormalizer, NormalizedAmount, NormalizedEntityResult, NormalizedProduct,
    NormalizedQuantity,
};
pub use patterns::{
    ExtractedAmount, ExtractedEntities, ExtractedQuantity, IntentScores, MatchResult,
    PatternMatcher, TransactionIntent,
};
pub use redaction::redact_snippet;
