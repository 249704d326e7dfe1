//! Weighted intent pattern tables
//!
//! Each intent has a table of `(pattern, weight)` pairs written against
//! folded text. English, Ghanaian Pidgin and common Twi phrasings share a
//! table.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Conversational intents recognized in a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionIntent {
    /// Customer asks for a price
    PriceInquiry,
    /// Seller names a price
    PriceQuote,
    /// Either side haggles
    Negotiation,
    /// Customer accepts
    Agreement,
    /// Money changes hands
    PaymentConfirmation,
    /// Sale abandoned
    Cancellation,
}

impl TransactionIntent {
    pub const ALL: [TransactionIntent; 6] = [
        TransactionIntent::PriceInquiry,
        TransactionIntent::PriceQuote,
        TransactionIntent::Negotiation,
        TransactionIntent::Agreement,
        TransactionIntent::PaymentConfirmation,
        TransactionIntent::Cancellation,
    ];

    /// Confidence the intent must exceed to count as matched
    pub fn threshold(&self) -> f32 {
        match self {
            TransactionIntent::Negotiation => 0.5,
            TransactionIntent::PriceInquiry
            | TransactionIntent::PriceQuote
            | TransactionIntent::Agreement
            | TransactionIntent::PaymentConfirmation
            | TransactionIntent::Cancellation => 0.6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionIntent::PriceInquiry => "price_inquiry",
            TransactionIntent::PriceQuote => "price_quote",
            TransactionIntent::Negotiation => "negotiation",
            TransactionIntent::Agreement => "agreement",
            TransactionIntent::PaymentConfirmation => "payment_confirmation",
            TransactionIntent::Cancellation => "cancellation",
        }
    }
}

impl std::fmt::Display for TransactionIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type PatternTable = Vec<(Regex, f32)>;

fn table(entries: &[(&str, f32)]) -> PatternTable {
    entries
        .iter()
        .map(|(pattern, weight)| (Regex::new(pattern).unwrap(), *weight))
        .collect()
}

static INQUIRY: Lazy<PatternTable> = Lazy::new(|| {
    table(&[
        (r"\bhow much\b", 0.8),
        (r"\bhow much (?:is|are|for|be)\b", 0.85),
        (r"\bwhat(?:'s| is) (?:the )?(?:price|cost)\b", 0.85),
        (r"\bprice of\b", 0.7),
        (r"\bhow do you sell\b", 0.8),
        (r"\bhow (?:you dey|do you) sell\b", 0.8),
        (r"\bwetin be (?:the )?price\b", 0.8),
        (r"\b(?:eye|ye) sen\b", 0.8),
        (r"\bsen na\b", 0.8),
        (r"\bsen\?", 0.7),
    ])
});

static QUOTE: Lazy<PatternTable> = Lazy::new(|| {
    table(&[
        (r"\b(?:the )?price is\b", 0.75),
        (r"\b(?:it )?costs?\b", 0.75),
        (r"\b(?:i )?sell (?:it )?(?:for|at)\b", 0.75),
        (r"\bper [a-z]+\b", 0.6),
        (r"\beach\b", 0.6),
        (r"\b(?:it's|it is|that's|that is|they are|dem be) (?:\d|gh|a |one|two|three|four|five|six|seven|eight|nine|ten|twenty|thirty|forty|fifty|hundred)", 0.65),
        (r"\bgive me (?:\d+|[a-z]+) cedis?\b", 0.6),
        (r"\beye\b.*\b(?:cedis?|sidi|sedi)\b", 0.7),
    ])
});

static NEGOTIATION: Lazy<PatternTable> = Lazy::new(|| {
    table(&[
        (r"\btoo (?:much|expensive|high|costly)\b", 0.8),
        (r"\b(?:reduce|lower|discount|come down)\b", 0.75),
        (r"\b(?:last|best|final) price\b", 0.8),
        (r"\bcan you (?:do|make it|give)\b", 0.7),
        (r"\bmake it\b", 0.7),
        (r"\bhow about\b", 0.7),
        (r"\bi(?:'ll| will) give you\b", 0.7),
        (r"\bi can (?:pay|only pay|do)\b", 0.7),
        (r"\bte so\b", 0.8),
        (r"\bewo dodo\b", 0.8),
        (r"\bcheaper\b", 0.65),
    ])
});

static AGREEMENT: Lazy<PatternTable> = Lazy::new(|| {
    table(&[
        (r"\bi(?:'ll| will) take\b", 0.85),
        (r"\b(?:deal|agreed)\b", 0.8),
        (r"\bi(?:'ll| will) buy\b", 0.8),
        (r"\b(?:give me|let me have|wrap it)\b", 0.7),
        (r"\bthat(?:'s| is) (?:fine|good|ok|okay)\b", 0.75),
        (r"\b(?:ok|okay|alright|fine|yoo|yes)\b", 0.65),
        (r"\bmede\b", 0.75),
    ])
});

static PAYMENT: Lazy<PatternTable> = Lazy::new(|| {
    table(&[
        (r"\b(?:paid|i've paid|i have paid|payment (?:done|made|received))\b", 0.9),
        (r"\bhere(?:'s| is) (?:the|your) money\b", 0.85),
        (r"\b(?:momo|mobile money)\b", 0.7),
        (r"\b(?:i )?(?:sent|received) (?:it|the money|am)\b", 0.75),
        (r"\bkeep the change\b", 0.75),
        (r"\bmatua\b", 0.85),
        (r"\bme (?:a )?tua\b", 0.85),
    ])
});

static CANCELLATION: Lazy<PatternTable> = Lazy::new(|| {
    table(&[
        (r"\bcancel\b", 0.9),
        (r"\bforget (?:it|about it)\b", 0.85),
        (r"\bnever ?mind\b", 0.8),
        (r"\bi don't want\b", 0.75),
        (r"\bno,? thanks?\b", 0.7),
        (r"\bleave it\b", 0.65),
        (r"\bi(?:'m| am) not (?:buying|interested)\b", 0.8),
        (r"\bmempe\b", 0.75),
    ])
});

/// Pattern table for an intent
pub(crate) fn patterns_for(intent: TransactionIntent) -> &'static PatternTable {
    match intent {
        TransactionIntent::PriceInquiry => &INQUIRY,
        TransactionIntent::PriceQuote => &QUOTE,
        TransactionIntent::Negotiation => &NEGOTIATION,
        TransactionIntent::Agreement => &AGREEMENT,
        TransactionIntent::PaymentConfirmation => &PAYMENT,
        TransactionIntent::Cancellation => &CANCELLATION,
    }
}

/// Base score for an intent: best weight plus 0.05 per extra hit
///
/// Returns the score and the matched pattern texts.
pub(crate) fn base_score(intent: TransactionIntent, text: &str) -> (f32, Vec<String>) {
    let mut best = 0.0f32;
    let mut hits = Vec::new();
    for (pattern, weight) in patterns_for(intent).iter() {
        if let Some(m) = pattern.find(text) {
            best = best.max(*weight);
            hits.push(m.as_str().to_string());
        }
    }
    if hits.is_empty() {
        return (0.0, hits);
    }
    let score = best + 0.05 * (hits.len() - 1) as f32;
    (score.min(1.0), hits)
}
