//! Conversation State Machine
//!
//! Follows one sale at a time through
//! `Idle -> Inquiry -> PriceQuote -> (Negotiation) -> Agreement -> Payment -> Complete`
//! and emits a [`Transaction`] when it closes.
//!
//! Utterances are serialized through a single mutex: a transition reads the
//! context, scores it and writes it back, so concurrent callers feeding the
//! same stall must not interleave. Run one machine per stall for multi-stall
//! deployments.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::events::{LedgerEvent, ResetReason};
use crate::session::{ConversationContext, StateTransition};
use voice_ledger_config::EngineConfig;
use voice_ledger_core::{
    clamp_confidence, ConversationState, SpeakerRole, Transaction, TransactionSink,
};
use voice_ledger_text_processing::{
    EntityNormalizer, IntentScores, PatternMatcher, TransactionIntent,
};

/// Confidence of a transition that leaves the state unchanged
const NEUTRAL_CONFIDENCE: f32 = 0.5;
/// Base confidence for reaching `Complete`
const COMPLETE_CONFIDENCE: f32 = 0.9;

/// Sale tracker for one market stall
pub struct ConversationStateMachine {
    context: Mutex<ConversationContext>,
    matcher: Arc<PatternMatcher>,
    normalizer: Arc<EntityNormalizer>,
    config: EngineConfig,
    sink: Option<Arc<dyn TransactionSink>>,
    event_tx: broadcast::Sender<LedgerEvent>,
}

impl ConversationStateMachine {
    /// Create a state machine for the built-in market vocabulary
    pub fn new(config: EngineConfig) -> Self {
        Self::with_components(
            config,
            Arc::new(PatternMatcher::new()),
            Arc::new(EntityNormalizer::new()),
        )
    }

    /// Create a state machine sharing a matcher and normalizer
    pub fn with_components(
        config: EngineConfig,
        matcher: Arc<PatternMatcher>,
        normalizer: Arc<EntityNormalizer>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            context: Mutex::new(ConversationContext::new(Utc::now())),
            matcher,
            normalizer,
            config,
            sink: None,
            event_tx,
        }
    }

    /// Persist emitted transactions through a storage collaborator
    pub fn with_sink(mut self, sink: Arc<dyn TransactionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Subscribe to ledger events
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the active context
    pub fn context(&self) -> ConversationContext {
        self.context.lock().clone()
    }

    pub fn current_state(&self) -> ConversationState {
        self.context.lock().state
    }

    /// Feed one utterance and return the resulting transition
    ///
    /// Never fails: an utterance that matches nothing yields a transition
    /// with `from == to` and confidence 0.5 that leaves extracted fields
    /// untouched. When payment is confirmed the session closes in the same
    /// call and the returned transition is `Payment -> Complete`.
    pub fn process_utterance(
        &self,
        text: &str,
        speaker_id: &str,
        is_seller: bool,
        timestamp: DateTime<Utc>,
    ) -> StateTransition {
        let (scores, entities) = self.matcher.analyze(text);
        let speaker = SpeakerRole::from_is_seller(is_seller);

        let mut context = self.context.lock();

        if !context.is_pristine() && context.is_expired(timestamp, self.timeout()) {
            tracing::info!(
                session_id = %context.session_id,
                state = %context.state,
                "Session timed out, starting fresh"
            );
            self.reset_locked(&mut context, ResetReason::Timeout, timestamp);
        }
        if context.is_pristine() {
            context.restamp(timestamp);
        }
        context.touch(timestamp);
        context.record_utterance(text, self.config.utterance_window);

        let from = context.state;
        let (to, base) = determine_next_state(
            from,
            &scores,
            is_seller,
            self.config.cancellation_threshold,
        );
        let confidence = transition_confidence(from, to, base);
        let valid = is_valid_transition(from, to, confidence);

        let transition = StateTransition {
            from,
            to,
            trigger_text: text.to_string(),
            speaker,
            confidence,
            timestamp,
            extracted_data: entities.to_map(),
            valid,
        };

        if !valid {
            tracing::trace!(state = %from, candidate = %to, confidence, "No transition");
            return transition;
        }

        if from == ConversationState::Idle {
            context.begin_sale(timestamp);
        }

        let normalized = self.normalizer.normalize_entities(&entities);
        let per_unit = entities.quantity.as_ref().map_or(false, |q| q.per_unit);
        // Quotes and counter-offers set the price; elsewhere only a spoken
        // currency does
        let sets_price = matches!(
            to,
            ConversationState::PriceQuote | ConversationState::Negotiation
        ) || entities.amount.as_ref().map_or(false, |a| a.has_currency());
        context.merge(&normalized, per_unit, sets_price);
        context.record_speaker(speaker_id, speaker);
        self.apply_locked(&mut context, transition.clone());

        let mut last = transition;
        if context.state == ConversationState::Payment {
            // Payment confirmation closes the sale
            let (to, _) = determine_next_state(
                ConversationState::Payment,
                &scores,
                is_seller,
                self.config.cancellation_threshold,
            );
            let closing = StateTransition {
                from: ConversationState::Payment,
                to,
                trigger_text: text.to_string(),
                speaker,
                confidence: transition_confidence(ConversationState::Payment, to, COMPLETE_CONFIDENCE),
                timestamp,
                extracted_data: last.extracted_data.clone(),
                valid: true,
            };
            self.apply_locked(&mut context, closing.clone());
            last = closing;
        }

        match context.state {
            ConversationState::Complete => {
                if self.emit_transaction_locked(&context).is_some() {
                    self.reset_locked(&mut context, ResetReason::Completed, timestamp);
                } else {
                    tracing::warn!(
                        session_id = %context.session_id,
                        has_amount = context.amount.is_some(),
                        has_product = context.product.is_some(),
                        "Sale completed without amount and product, discarding"
                    );
                    self.reset_locked(&mut context, ResetReason::Incomplete, timestamp);
                }
            },
            ConversationState::Cancelled => {
                self.reset_locked(&mut context, ResetReason::Cancelled, timestamp);
            },
            ConversationState::Idle
            | ConversationState::Inquiry
            | ConversationState::PriceQuote
            | ConversationState::Negotiation
            | ConversationState::Agreement
            | ConversationState::Payment => {},
        }

        last
    }

    /// Close the active session if amount and product are known
    ///
    /// Used on shutdown. Returns the emitted transaction, or `None` if the
    /// session lacked sale data (the session is left untouched then).
    pub fn force_complete(&self) -> Option<Transaction> {
        let mut context = self.context.lock();
        let transaction = self.emit_transaction_locked(&context)?;
        let now = context.last_activity;
        self.reset_locked(&mut context, ResetReason::Completed, now);
        Some(transaction)
    }

    /// Discard the active session
    pub fn reset(&self) {
        let mut context = self.context.lock();
        self.reset_locked(&mut context, ResetReason::Manual, Utc::now());
    }

    fn timeout(&self) -> Duration {
        Duration::from_std(self.config.session_timeout()).unwrap_or_else(|_| Duration::seconds(120))
    }

    fn apply_locked(&self, context: &mut ConversationContext, transition: StateTransition) {
        tracing::debug!(
            session_id = %context.session_id,
            from = %transition.from,
            to = %transition.to,
            confidence = transition.confidence,
            "State transition"
        );
        let event = LedgerEvent::StateChanged {
            session_id: context.session_id.clone(),
            from: transition.from,
            to: transition.to,
            confidence: transition.confidence,
        };
        context.apply(transition);
        let _ = self.event_tx.send(event);
    }

    fn emit_transaction_locked(&self, context: &ConversationContext) -> Option<Transaction> {
        let (amount, product) = match (context.amount, context.product.as_ref()) {
            (Some(amount), Some(product)) => (amount, product.clone()),
            _ => return None,
        };

        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            timestamp: context.started_at,
            amount,
            currency: self.normalizer.currency_code().to_string(),
            product,
            quantity: context.quantity,
            unit: context.unit.clone(),
            customer_id: context.customer_id.clone(),
            seller_id: context.seller_id.clone(),
            confidence: context.overall_confidence,
            transcript_snippet: context
                .snippet(self.config.snippet_utterances, self.config.snippet_max_chars),
            needs_review: context.overall_confidence < self.config.min_confidence,
            synced: false,
        };

        tracing::info!(
            transaction_id = %transaction.id,
            summary = %transaction.summary(),
            confidence = transaction.confidence,
            needs_review = transaction.needs_review,
            "Transaction detected"
        );

        if let Some(ref sink) = self.sink {
            if let Err(e) = sink.persist(&transaction) {
                tracing::warn!(transaction_id = %transaction.id, error = %e, "Failed to persist transaction");
            }
        }
        let _ = self
            .event_tx
            .send(LedgerEvent::TransactionDetected(transaction.clone()));

        Some(transaction)
    }

    fn reset_locked(
        &self,
        context: &mut ConversationContext,
        reason: ResetReason,
        now: DateTime<Utc>,
    ) {
        let old_session = std::mem::replace(context, ConversationContext::new(now));
        tracing::debug!(session_id = %old_session.session_id, ?reason, "Session reset");
        let _ = self.event_tx.send(LedgerEvent::SessionReset {
            session_id: old_session.session_id,
            reason,
        });
    }
}

/// Candidate next state and the intent score backing it
///
/// Pure function of the current state, the utterance scores and who spoke.
/// Cancellation above `cancellation_threshold` wins from any non-terminal
/// state.
pub fn determine_next_state(
    current: ConversationState,
    scores: &IntentScores,
    is_seller: bool,
    cancellation_threshold: f32,
) -> (ConversationState, f32) {
    use ConversationState as S;
    use TransactionIntent as I;

    if !current.is_terminal() && scores.cancellation > cancellation_threshold {
        return (S::Cancelled, scores.cancellation);
    }

    let is_customer = !is_seller;
    let hit = |intent: I, allowed: bool, to: S| {
        (allowed && scores.is_match(intent)).then(|| (to, scores.get(intent)))
    };
    let best = |candidates: &[Option<(S, f32)>], fallback: S| {
        candidates
            .iter()
            .flatten()
            .fold(None::<(S, f32)>, |best, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(*candidate),
            })
            .unwrap_or((fallback, 0.0))
    };

    match current {
        S::Idle => best(&[hit(I::PriceInquiry, is_customer, S::Inquiry)], S::Idle),
        S::Inquiry => best(
            &[
                hit(I::PriceQuote, is_seller, S::PriceQuote),
                hit(I::PriceInquiry, is_customer, S::Inquiry),
            ],
            S::Inquiry,
        ),
        S::PriceQuote => best(
            &[
                hit(I::Negotiation, is_customer, S::Negotiation),
                hit(I::Agreement, is_customer, S::Agreement),
                hit(I::PriceQuote, is_seller, S::PriceQuote),
            ],
            S::PriceQuote,
        ),
        S::Negotiation => best(
            &[
                hit(I::PriceQuote, is_seller, S::PriceQuote),
                hit(I::Agreement, is_customer, S::Agreement),
                hit(I::Negotiation, true, S::Negotiation),
            ],
            S::Negotiation,
        ),
        S::Agreement => best(
            &[
                hit(I::PaymentConfirmation, true, S::Payment),
                hit(I::Negotiation, true, S::Negotiation),
            ],
            S::Agreement,
        ),
        S::Payment => (S::Complete, COMPLETE_CONFIDENCE),
        S::Complete | S::Cancelled => best(
            &[hit(I::PriceInquiry, is_customer, S::Inquiry)],
            S::Idle,
        ),
    }
}

/// Bonus for following the expected path of a sale
fn transition_bonus(from: ConversationState, to: ConversationState) -> f32 {
    use ConversationState as S;
    match (from, to) {
        (S::Payment, S::Complete) => 0.2,
        (S::Idle, S::Inquiry)
        | (S::Inquiry, S::PriceQuote)
        | (S::PriceQuote, S::Negotiation)
        | (S::PriceQuote, S::Agreement)
        | (S::Negotiation, S::Agreement)
        | (S::Agreement, S::Payment) => 0.1,
        _ => 0.0,
    }
}

/// `base + bonus`, capped at 1.0; 0.5 when the state is unchanged
pub fn transition_confidence(from: ConversationState, to: ConversationState, base: f32) -> f32 {
    if from == to {
        return NEUTRAL_CONFIDENCE;
    }
    let base = if to == ConversationState::Complete {
        COMPLETE_CONFIDENCE
    } else {
        base
    };
    clamp_confidence(base + transition_bonus(from, to))
}

/// Whether a candidate transition should be applied
///
/// The destination must differ and its confidence must exceed the intent
/// threshold. `Idle` and
/// `Complete` are fallbacks and always apply.
pub fn is_valid_transition(from: ConversationState, to: ConversationState, confidence: f32) -> bool {
    use ConversationState as S;
    if from == to {
        return false;
    }
    let threshold = match to {
        S::Idle | S::Complete => return true,
        S::Inquiry => TransactionIntent::PriceInquiry.threshold(),
        S::PriceQuote => TransactionIntent::PriceQuote.threshold(),
        S::Negotiation => TransactionIntent::Negotiation.threshold(),
        S::Agreement => TransactionIntent::Agreement.threshold(),
        S::Payment => TransactionIntent::PaymentConfirmation.threshold(),
        S::Cancelled => TransactionIntent::Cancellation.threshold(),
    };
    confidence > threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_ledger_core::{Error, Result};

    fn machine() -> ConversationStateMachine {
        ConversationStateMachine::new(EngineConfig::default())
    }

    #[test]
    fn test_inquiry_then_quote() {
        let sm = machine();
        let now = Utc::now();

        let t1 = sm.process_utterance("How much for tilapia?", "kofi", false, now);
        assert_eq!(t1.from, ConversationState::Idle);
        assert_eq!(t1.to, ConversationState::Inquiry);
        assert!(t1.valid);

        let t2 = sm.process_utterance("25 cedis per kilo", "ama", true, now + Duration::seconds(5));
        assert_eq!(t2.to, ConversationState::PriceQuote);

        let context = sm.context();
        assert_eq!(context.amount, Some(25.0));
        assert_eq!(context.product.as_deref(), Some("Tilapia"));
        assert_eq!(context.history.len(), 2);
    }

    #[test]
    fn test_seller_cannot_open_inquiry() {
        let sm = machine();
        let t = sm.process_utterance("How much for tilapia?", "ama", true, Utc::now());
        assert_eq!(t.to, ConversationState::Idle);
        assert!(!t.valid);
        assert_eq!(t.confidence, 0.5);
    }

    #[test]
    fn test_noop_keeps_fields() {
        let sm = machine();
        let now = Utc::now();
        sm.process_utterance("How much for tilapia?", "kofi", false, now);
        let t = sm.process_utterance("the weather is hot", "kofi", false, now);
        assert!(t.is_noop());
        assert_eq!(t.confidence, 0.5);
        assert_eq!(sm.context().product.as_deref(), Some("Tilapia"));
        assert_eq!(sm.context().history.len(), 1);
    }

    #[test]
    fn test_full_sale_emits_one_transaction() {
        let sm = machine();
        let mut events = sm.subscribe();
        let now = Utc::now();

        sm.process_utterance("How much for tilapia?", "kofi", false, now);
        sm.process_utterance("25 cedis per kilo", "ama", true, now);
        let agreement = sm.process_utterance("Ok I'll take it", "kofi", false, now);
        assert_eq!(agreement.to, ConversationState::Agreement);

        let closing = sm.process_utterance("Paid", "kofi", false, now);
        assert_eq!(closing.from, ConversationState::Payment);
        assert_eq!(closing.to, ConversationState::Complete);
        assert_eq!(sm.current_state(), ConversationState::Idle);

        let mut transactions = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let LedgerEvent::TransactionDetected(tx) = event {
                transactions.push(tx);
            }
        }
        assert_eq!(transactions.len(), 1);
        let tx = &transactions[0];
        assert_eq!(tx.amount, 25.0);
        assert_eq!(tx.product, "Tilapia");
        assert_eq!(tx.currency, "GHS");
        assert_eq!(tx.customer_id.as_deref(), Some("kofi"));
        assert_eq!(tx.seller_id.as_deref(), Some("ama"));
        assert_eq!(tx.timestamp, now);
        assert!(!tx.needs_review);
        assert!(tx.transcript_snippet.ends_with("Paid"));
    }

    #[test]
    fn test_cancellation_resets_without_transaction() {
        let sm = machine();
        let mut events = sm.subscribe();
        let now = Utc::now();

        sm.process_utterance("How much for tilapia?", "kofi", false, now);
        sm.process_utterance("25 cedis per kilo", "ama", true, now);
        let t = sm.process_utterance("Forget it, too expensive", "kofi", false, now);
        assert_eq!(t.to, ConversationState::Cancelled);
        assert_eq!(sm.current_state(), ConversationState::Idle);
        assert!(sm.context().amount.is_none());

        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, LedgerEvent::TransactionDetected(_)));
        }
    }

    #[test]
    fn test_timeout_starts_fresh() {
        let sm = machine();
        let start = Utc::now();
        sm.process_utterance("How much for tilapia?", "kofi", false, start);
        sm.process_utterance("25 cedis per kilo", "ama", true, start);

        let later = start + Duration::seconds(121);
        let t = sm.process_utterance("Ok I'll take it", "kofi", false, later);
        assert_eq!(t.from, ConversationState::Idle);
        assert_eq!(sm.current_state(), ConversationState::Idle);
        assert!(sm.context().amount.is_none());
    }

    #[test]
    fn test_force_complete() {
        let sm = machine();
        let now = Utc::now();
        assert!(sm.force_complete().is_none());

        sm.process_utterance("How much for tilapia?", "kofi", false, now);
        assert!(sm.force_complete().is_none());
        sm.process_utterance("25 cedis per kilo", "ama", true, now);

        let tx = sm.force_complete().unwrap();
        assert_eq!(tx.product, "Tilapia");
        assert_eq!(sm.current_state(), ConversationState::Idle);
    }

    struct FailingSink;

    impl TransactionSink for FailingSink {
        fn persist(&self, _transaction: &Transaction) -> Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }
    }

    #[test]
    fn test_sink_failure_does_not_block_emission() {
        let sm = machine().with_sink(Arc::new(FailingSink));
        let now = Utc::now();
        sm.process_utterance("How much for yam?", "kofi", false, now);
        sm.process_utterance("It's 30 cedis", "ama", true, now);
        assert!(sm.force_complete().is_some());
    }

    #[test]
    fn test_determine_next_state_is_pure() {
        let matcher = PatternMatcher::new();
        let scores = matcher.scores("Ok I'll take it");
        let (next, base) =
            determine_next_state(ConversationState::PriceQuote, &scores, false, 0.6);
        assert_eq!(next, ConversationState::Agreement);
        assert!(base >= 0.85);

        let (same, _) = determine_next_state(ConversationState::Idle, &scores, false, 0.6);
        assert_eq!(same, ConversationState::Idle);
    }

    #[test]
    fn test_terminal_states_reenter_inquiry() {
        let matcher = PatternMatcher::new();
        let inquiry = matcher.scores("How much is the gari?");
        let chatter = matcher.scores("thank you");
        assert_eq!(
            determine_next_state(ConversationState::Complete, &inquiry, false, 0.6).0,
            ConversationState::Inquiry
        );
        assert_eq!(
            determine_next_state(ConversationState::Cancelled, &chatter, false, 0.6).0,
            ConversationState::Idle
        );
    }

    #[test]
    fn test_transition_confidence() {
        use ConversationState as S;
        assert_eq!(transition_confidence(S::Inquiry, S::Inquiry, 0.9), 0.5);
        assert_eq!(transition_confidence(S::Payment, S::Complete, 0.0), 1.0);
        assert!((transition_confidence(S::Idle, S::Inquiry, 0.7) - 0.8).abs() < 1e-6);
        assert!((transition_confidence(S::Negotiation, S::PriceQuote, 0.7) - 0.7).abs() < 1e-6);
        assert_eq!(transition_confidence(S::Idle, S::Inquiry, 1.0), 1.0);
    }

    #[test]
    fn test_transition_validity() {
        use ConversationState as S;
        assert!(!is_valid_transition(S::Inquiry, S::Inquiry, 1.0));
        assert!(is_valid_transition(S::Cancelled, S::Idle, 0.0));
        assert!(!is_valid_transition(S::Inquiry, S::PriceQuote, 0.3));
        assert!(is_valid_transition(S::PriceQuote, S::Negotiation, 0.55));
        assert!(!is_valid_transition(S::Idle, S::Inquiry, 0.6));
        assert!(is_valid_transition(S::Idle, S::Inquiry, 0.61));
        assert!(!is_valid_transition(S::PriceQuote, S::Negotiation, 0.5));
    }

    #[test]
    fn test_agreed_count_keeps_quoted_price() {
        let sm = machine();
        let now = Utc::now();
        sm.process_utterance("How much for tilapia?", "kofi", false, now);
        sm.process_utterance("25 cedis each", "ama", true, now);

        let t = sm.process_utterance("Ok I'll take 2", "kofi", false, now);
        assert_eq!(t.to, ConversationState::Agreement);
        let context = sm.context();
        assert_eq!(context.amount, Some(25.0));
        assert_eq!(context.quantity, Some(2.0));

        let t = sm.process_utterance("Paid", "kofi", false, now);
        assert_eq!(t.to, ConversationState::Complete);
    }

    #[test]
    fn test_idle_chatter_does_not_open_sale() {
        let sm = machine();
        let start = Utc::now();
        let opened = start + Duration::seconds(40);
        sm.process_utterance("Good morning auntie", "kofi", false, start);
        sm.process_utterance("Hot today", "kofi", false, start + Duration::seconds(20));
        sm.process_utterance("How much for tilapia?", "kofi", false, opened);
        sm.process_utterance("25 cedis per kilo", "ama", true, opened);

        let tx = sm.force_complete().unwrap();
        assert_eq!(tx.timestamp, opened);
        assert!(!tx.transcript_snippet.contains("morning"));
        assert!(tx.transcript_snippet.starts_with("How much for tilapia?"));
    }
}
