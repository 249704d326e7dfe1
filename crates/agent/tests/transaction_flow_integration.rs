//! Integration tests for the sale flow (utterances -> state machine -> transaction)
//!
//! These tests drive the public API the way a stall's microphone task would.

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

use voice_ledger_agent::{
    ConversationStateMachine, CorrectionType, ExtractionCoordinator, LedgerEvent, ResetReason,
};
use voice_ledger_config::{EngineConfig, ExtractionConfig, MarketVocabularyConfig};
use voice_ledger_core::{
    ConversationState, InMemoryVocabulary, ProductVocabulary, Result, Transaction, TransactionSink,
};

#[derive(Default)]
struct RecordingSink {
    transactions: Mutex<Vec<Transaction>>,
}

impl TransactionSink for RecordingSink {
    fn persist(&self, transaction: &Transaction) -> Result<()> {
        self.transactions.lock().push(transaction.clone());
        Ok(())
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<LedgerEvent>) -> Vec<LedgerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Inquiry, quote, agreement and payment close exactly one sale
#[tokio::test]
async fn test_complete_sale_flow() {
    let sink = Arc::new(RecordingSink::default());
    let sm = ConversationStateMachine::new(EngineConfig::default()).with_sink(sink.clone());
    let mut rx = sm.subscribe();
    let start = Utc::now();

    let t = sm.process_utterance("How much for tilapia?", "customer-1", false, start);
    assert_eq!((t.from, t.to), (ConversationState::Idle, ConversationState::Inquiry));

    let t = sm.process_utterance("25 cedis per kilo", "seller-1", true, start + Duration::seconds(3));
    assert_eq!((t.from, t.to), (ConversationState::Inquiry, ConversationState::PriceQuote));
    assert_eq!(sm.context().amount, Some(25.0));
    assert_eq!(sm.context().product.as_deref(), Some("Tilapia"));

    let t = sm.process_utterance("Ok I'll take it", "customer-1", false, start + Duration::seconds(6));
    assert_eq!(t.to, ConversationState::Agreement);

    let t = sm.process_utterance("Paid", "seller-1", true, start + Duration::seconds(9));
    assert_eq!((t.from, t.to), (ConversationState::Payment, ConversationState::Complete));

    let events = drain(&mut rx);
    let detected: Vec<&Transaction> = events
        .iter()
        .filter_map(|e| match e {
            LedgerEvent::TransactionDetected(tx) => Some(tx),
            _ => None,
        })
        .collect();
    assert_eq!(detected.len(), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        LedgerEvent::StateChanged {
            from: ConversationState::Agreement,
            to: ConversationState::Payment,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        LedgerEvent::SessionReset {
            reason: ResetReason::Completed,
            ..
        }
    )));

    let stored = sink.transactions.lock();
    assert_eq!(stored.len(), 1);
    let tx = &stored[0];
    assert_eq!(tx.amount, 25.0);
    assert_eq!(tx.product, "Tilapia");
    assert_eq!(tx.unit.as_deref(), Some("kg"));
    assert_eq!(tx.timestamp, start);
    assert!((0.0..=1.0).contains(&tx.confidence));
    assert!(!tx.synced);
    assert_eq!(sm.current_state(), ConversationState::Idle);
}

/// Haggling moves through negotiation and the agreed price wins
#[tokio::test]
async fn test_negotiated_sale() {
    let sm = ConversationStateMachine::new(EngineConfig::default());
    let mut rx = sm.subscribe();
    let now = Utc::now();

    sm.process_utterance("How much is the yam?", "c", false, now);
    sm.process_utterance("40 cedis", "s", true, now);
    let t = sm.process_utterance("That's too much, I can pay 30", "c", false, now);
    assert_eq!(t.to, ConversationState::Negotiation);
    let t = sm.process_utterance("Last price 35 cedis", "s", true, now);
    assert_eq!(t.to, ConversationState::PriceQuote);
    sm.process_utterance("Deal", "c", false, now);
    sm.process_utterance("Here's the money", "c", false, now);

    let tx = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            LedgerEvent::TransactionDetected(tx) => Some(tx),
            _ => None,
        })
        .expect("sale detected");
    assert_eq!(tx.product, "Yam");
    assert_eq!(tx.amount, 35.0);
}

/// Cancellation from any active state ends the session silently
#[tokio::test]
async fn test_cancellation_never_emits() {
    for closing in ["Forget it", "Cancel", "Never mind, I'm not buying"] {
        let sm = ConversationStateMachine::new(EngineConfig::default());
        let mut rx = sm.subscribe();
        let now = Utc::now();

        sm.process_utterance("How much for the plantain?", "c", false, now);
        sm.process_utterance("20 cedis", "s", true, now);
        sm.process_utterance("Ok I'll take it", "c", false, now);
        let t = sm.process_utterance(closing, "c", false, now);
        assert_eq!(t.to, ConversationState::Cancelled, "{closing}");

        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|e| matches!(e, LedgerEvent::TransactionDetected(_))));
        assert!(sm.force_complete().is_none());
    }
}

/// The seller can walk away from every open state too
#[tokio::test]
async fn test_seller_cancellation_from_each_state() {
    let openings: [(&[(&str, bool)], ConversationState); 4] = [
        (&[("How much for the plantain?", false)], ConversationState::Inquiry),
        (
            &[("How much for the plantain?", false), ("20 cedis", true)],
            ConversationState::PriceQuote,
        ),
        (
            &[
                ("How much for the plantain?", false),
                ("20 cedis", true),
                ("That's too much", false),
            ],
            ConversationState::Negotiation,
        ),
        (
            &[
                ("How much for the plantain?", false),
                ("20 cedis", true),
                ("Ok I'll take it", false),
            ],
            ConversationState::Agreement,
        ),
    ];

    for (utterances, reached) in openings {
        let sm = ConversationStateMachine::new(EngineConfig::default());
        let mut rx = sm.subscribe();
        let now = Utc::now();

        for (text, is_seller) in utterances {
            sm.process_utterance(text, "stall", *is_seller, now);
        }
        assert_eq!(sm.current_state(), reached);

        let t = sm.process_utterance("Forget it", "seller", true, now);
        assert_eq!((t.from, t.to), (reached, ConversationState::Cancelled));
        assert_eq!(sm.current_state(), ConversationState::Idle);

        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|e| matches!(e, LedgerEvent::TransactionDetected(_))));
        assert!(events.iter().any(|e| matches!(
            e,
            LedgerEvent::SessionReset {
                reason: ResetReason::Cancelled,
                ..
            }
        )));
    }
}

/// A count spoken while agreeing is a quantity, not a new price
#[tokio::test]
async fn test_agreed_count_does_not_override_price() {
    let sink = Arc::new(RecordingSink::default());
    let sm = ConversationStateMachine::new(EngineConfig::default()).with_sink(sink.clone());
    let now = Utc::now();

    sm.process_utterance("How much for tilapia?", "c", false, now);
    sm.process_utterance("25 cedis each", "s", true, now);
    let t = sm.process_utterance("Ok I'll take 2", "c", false, now);
    assert_eq!(t.to, ConversationState::Agreement);
    sm.process_utterance("Paid", "c", false, now);

    let stored = sink.transactions.lock();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].amount, 25.0);
    assert_eq!(stored[0].quantity, Some(2.0));
    assert_eq!(stored[0].product, "Tilapia");
}

/// A stale session never resumes
#[tokio::test]
async fn test_timeout_resets_context() {
    let config = EngineConfig {
        session_timeout_secs: 60,
        ..EngineConfig::default()
    };
    let sm = ConversationStateMachine::new(config);
    let mut rx = sm.subscribe();
    let start = Utc::now();

    sm.process_utterance("How much for tilapia?", "c", false, start);
    sm.process_utterance("25 cedis per kilo", "s", true, start);
    assert_eq!(sm.current_state(), ConversationState::PriceQuote);

    let t = sm.process_utterance("Paid", "c", false, start + Duration::seconds(61));
    assert_eq!(t.from, ConversationState::Idle);
    assert_eq!(sm.current_state(), ConversationState::Idle);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        LedgerEvent::SessionReset {
            reason: ResetReason::Timeout,
            ..
        }
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, LedgerEvent::TransactionDetected(_))));
}

/// Low-confidence sales are kept but flagged
#[tokio::test]
async fn test_low_confidence_needs_review() {
    let config = EngineConfig {
        min_confidence: 1.01,
        ..EngineConfig::default()
    };
    let sm = ConversationStateMachine::new(config);
    let now = Utc::now();
    sm.process_utterance("How much for gari?", "c", false, now);
    sm.process_utterance("10 cedis a bowl", "s", true, now);

    let tx = sm.force_complete().expect("sale data known");
    assert!(tx.needs_review);
}

/// Two callers feeding one stall never interleave a transition
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers() {
    let sm = Arc::new(ConversationStateMachine::new(EngineConfig::default()));
    let now = Utc::now();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let sm = Arc::clone(&sm);
            tokio::task::spawn_blocking(move || {
                let text = if i % 2 == 0 { "How much for tilapia?" } else { "hello" };
                sm.process_utterance(text, "c", false, now)
            })
        })
        .collect();
    for handle in handles {
        let t = handle.await.unwrap();
        assert!((0.0..=1.0).contains(&t.confidence));
    }

    let context = sm.context();
    assert_eq!(context.state, ConversationState::Inquiry);
    assert_eq!(context.history.len(), 1);
}

/// Coordinator results are cached and corrections are learned
#[tokio::test]
async fn test_coordinator_cache_and_learning() {
    let vocabulary = Arc::new(InMemoryVocabulary::with_products(
        MarketVocabularyConfig::default().to_products(),
    ));
    let coordinator =
        ExtractionCoordinator::new(&ExtractionConfig::default(), vocabulary.clone());

    let first = coordinator.process_transcript("3 tubers of bayere for 45 cedis", Some("s"), Utc::now());
    let data = first.transaction_data.clone().unwrap();
    assert_eq!(data.product, "Yam");
    assert_eq!(data.quantity, Some(3.0));
    assert_eq!(data.unit.as_deref(), Some("tuber"));

    let second = coordinator.process_transcript("3 tubers of bayere for 45 cedis", Some("s"), Utc::now());
    assert!(second.from_cache);
    assert_eq!(second.transaction_data, first.transaction_data);

    coordinator
        .learn_from_correction("give me 5 cedis of bodie", "Plantain", CorrectionType::Product)
        .unwrap();
    let plantain = vocabulary.lookup_product("bodie").unwrap().unwrap();
    assert_eq!(plantain.name, "Plantain");

    let low = coordinator.process_transcript("kosua for 10 pesewas", None, Utc::now());
    assert!(low.validation.has_issue("AMOUNT_TOO_LOW"));
    assert!(low.validation.is_valid);

    let high = coordinator.process_transcript("rice for 1500 cedis", None, Utc::now());
    assert!(high.validation.has_issue("AMOUNT_HIGH"));
}
