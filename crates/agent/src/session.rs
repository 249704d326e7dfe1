//! Conversation session context
//!
//! One `ConversationContext` tracks the sale in progress at a stall. It is
//! owned by the state machine and replaced wholesale on completion,
//! cancellation or timeout.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use voice_ledger_core::{clamp_confidence, ConversationState, SpeakerRole};
use voice_ledger_text_processing::{redact_snippet, NormalizedEntityResult};

/// One step of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ConversationState,
    pub to: ConversationState,
    pub trigger_text: String,
    pub speaker: SpeakerRole,
    /// Confidence (0.0 - 1.0)
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    /// Raw entity text found in the utterance
    pub extracted_data: HashMap<String, String>,
    /// Whether the transition was applied to the context
    pub valid: bool,
}

impl StateTransition {
    /// Transition that leaves the state unchanged
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Best-known facts about the sale in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub state: ConversationState,
    /// Applied transitions, oldest first
    pub history: Vec<StateTransition>,
    pub seller_id: Option<String>,
    pub customer_id: Option<String>,
    pub amount: Option<f64>,
    pub product: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    /// Rolling confidence over applied transitions
    pub overall_confidence: f32,
    /// Most recent utterances, oldest first
    pub recent_utterances: VecDeque<String>,
}

impl ConversationContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: now,
            last_activity: now,
            state: ConversationState::Idle,
            history: Vec::new(),
            seller_id: None,
            customer_id: None,
            amount: None,
            product: None,
            category: None,
            quantity: None,
            unit: None,
            overall_confidence: 0.0,
            recent_utterances: VecDeque::new(),
        }
    }

    /// No utterance has reached this context yet
    pub fn is_pristine(&self) -> bool {
        self.history.is_empty() && self.recent_utterances.is_empty()
    }

    /// Idle for longer than `timeout` as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now.signed_duration_since(self.last_activity) > timeout
    }

    /// Move the session start to the first utterance's time
    pub(crate) fn restamp(&mut self, now: DateTime<Utc>) {
        self.started_at = now;
        self.last_activity = now;
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Remember an utterance, keeping at most `window` entries
    pub(crate) fn record_utterance(&mut self, text: &str, window: usize) {
        self.recent_utterances.push_back(text.trim().to_string());
        while self.recent_utterances.len() > window.max(1) {
            self.recent_utterances.pop_front();
        }
    }

    pub(crate) fn record_speaker(&mut self, speaker_id: &str, role: SpeakerRole) {
        if speaker_id.trim().is_empty() {
            return;
        }
        let slot = match role {
            SpeakerRole::Seller => &mut self.seller_id,
            SpeakerRole::Customer => &mut self.customer_id,
        };
        *slot = Some(speaker_id.to_string());
    }

    /// Open a sale: the session starts at the utterance that left `Idle`
    /// and earlier chatter drops out of the snippet window
    pub(crate) fn begin_sale(&mut self, now: DateTime<Utc>) {
        self.started_at = now;
        let keep = self.recent_utterances.len().saturating_sub(1);
        self.recent_utterances.drain(..keep);
    }

    /// Merge newly normalized values; absent or invalid values never clear
    /// known ones
    ///
    /// A known price is only replaced when `sets_price` holds, so a stray
    /// number in an agreement or payment line cannot rewrite the quote.
    pub(crate) fn merge(
        &mut self,
        normalized: &NormalizedEntityResult,
        per_unit: bool,
        sets_price: bool,
    ) {
        if let Some(amount) = normalized.amount.as_ref().filter(|a| a.is_valid()) {
            if sets_price || self.amount.is_none() {
                self.amount = Some(amount.value);
            }
        }
        if let Some(product) = normalized.product.as_ref().filter(|p| p.is_valid()) {
            self.product = Some(product.name.clone());
            if product.category.is_some() {
                self.category = product.category.clone();
            }
        }
        if let Some(quantity) = normalized.quantity.as_ref().filter(|q| q.is_valid()) {
            if per_unit {
                // "per kilo" names the unit, not how much was bought
                if self.unit.is_none() {
                    self.unit = quantity.unit.clone();
                }
            } else {
                self.quantity = Some(quantity.value);
                if quantity.unit.is_some() {
                    self.unit = quantity.unit.clone();
                }
            }
        }
    }

    /// Append an applied transition and refresh the rolling confidence
    pub(crate) fn apply(&mut self, transition: StateTransition) {
        self.state = transition.to;
        self.history.push(transition);

        let count = self.history.len() as f32;
        let mean = self.history.iter().map(|t| t.confidence).sum::<f32>() / count;
        self.overall_confidence = clamp_confidence(mean + 0.1 * count);
    }

    /// Both amount and product are known
    pub fn has_sale_data(&self) -> bool {
        self.amount.is_some() && self.product.is_some()
    }

    /// Redacted excerpt of the last `utterances` utterances
    pub fn snippet(&self, utterances: usize, max_chars: usize) -> String {
        let skip = self.recent_utterances.len().saturating_sub(utterances);
        let joined = self
            .recent_utterances
            .iter()
            .skip(skip)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" | ");
        redact_snippet(&joined, max_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_ledger_text_processing::{EntityNormalizer, PatternMatcher};

    fn transition(from: ConversationState, to: ConversationState, confidence: f32) -> StateTransition {
        StateTransition {
            from,
            to,
            trigger_text: String::new(),
            speaker: SpeakerRole::Customer,
            confidence,
            timestamp: Utc::now(),
            extracted_data: HashMap::new(),
            valid: true,
        }
    }

    #[test]
    fn test_rolling_confidence() {
        let mut context = ConversationContext::new(Utc::now());
        context.apply(transition(ConversationState::Idle, ConversationState::Inquiry, 0.6));
        assert!((context.overall_confidence - 0.7).abs() < 1e-6);

        context.apply(transition(ConversationState::Inquiry, ConversationState::PriceQuote, 1.0));
        assert_eq!(context.overall_confidence, 1.0);
        assert_eq!(context.state, ConversationState::PriceQuote);
    }

    #[test]
    fn test_utterance_window() {
        let mut context = ConversationContext::new(Utc::now());
        for i in 0..7 {
            context.record_utterance(&format!("utterance {i}"), 5);
        }
        assert_eq!(context.recent_utterances.len(), 5);
        assert_eq!(context.recent_utterances.front().unwrap(), "utterance 2");
        assert_eq!(context.snippet(3, 200), "utterance 4 | utterance 5 | utterance 6");
    }

    #[test]
    fn test_snippet_is_redacted() {
        let mut context = ConversationContext::new(Utc::now());
        context.record_utterance("call me on 0244123456", 5);
        assert!(context.snippet(3, 200).contains("[PHONE]"));
    }

    #[test]
    fn test_merge_never_clobbers() {
        let matcher = PatternMatcher::new();
        let normalizer = EntityNormalizer::new();
        let mut context = ConversationContext::new(Utc::now());

        let first = normalizer.normalize_entities(&matcher.extract_entities("how much for tilapia"));
        context.merge(&first, false, true);
        let second = normalizer.normalize_entities(&matcher.extract_entities("25 cedis per kilo"));
        context.merge(&second, true, true);

        assert_eq!(context.product.as_deref(), Some("Tilapia"));
        assert_eq!(context.amount, Some(25.0));
        assert_eq!(context.unit.as_deref(), Some("kg"));
        assert_eq!(context.quantity, None);
    }

    #[test]
    fn test_bare_number_keeps_quoted_price() {
        let matcher = PatternMatcher::new();
        let normalizer = EntityNormalizer::new();
        let mut context = ConversationContext::new(Utc::now());

        let quote = normalizer.normalize_entities(&matcher.extract_entities("25 cedis each"));
        context.merge(&quote, false, true);
        let stray = normalizer.normalize_entities(&matcher.extract_entities("it's 2"));
        assert!(stray.amount.is_some());
        context.merge(&stray, false, false);
        assert_eq!(context.amount, Some(25.0));

        let counter = normalizer.normalize_entities(&matcher.extract_entities("I can do 20"));
        context.merge(&counter, false, true);
        assert_eq!(context.amount, Some(20.0));
    }

    #[test]
    fn test_begin_sale_drops_idle_chatter() {
        let start = Utc::now();
        let mut context = ConversationContext::new(start);
        context.record_utterance("good morning auntie", 5);
        context.record_utterance("how much for tilapia?", 5);

        let opened = start + Duration::seconds(30);
        context.begin_sale(opened);
        assert_eq!(context.started_at, opened);
        assert_eq!(context.snippet(3, 200), "how much for tilapia?");
    }

    #[test]
    fn test_expiry() {
        let start = Utc::now();
        let context = ConversationContext::new(start);
        assert!(!context.is_expired(start + Duration::seconds(120), Duration::seconds(120)));
        assert!(context.is_expired(start + Duration::seconds(121), Duration::seconds(120)));
    }

    #[test]
    fn test_speaker_roles() {
        let mut context = ConversationContext::new(Utc::now());
        context.record_speaker("ama", SpeakerRole::Seller);
        context.record_speaker("kofi", SpeakerRole::Customer);
        context.record_speaker("", SpeakerRole::Customer);
        assert_eq!(context.seller_id.as_deref(), Some("ama"));
        assert_eq!(context.customer_id.as_deref(), Some("kofi"));
    }
}
