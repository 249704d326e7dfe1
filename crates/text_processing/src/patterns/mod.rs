//! Intent Pattern Matching
//!
//! Scores an utterance against every sale intent independently. A single
//! utterance may satisfy several intents ("ok, 20 cedis" reads as both an
//! agreement and a quote); the conversation state machine decides which one
//! is relevant in context.
//!
//! Product and quantity patterns are compiled from the market vocabulary, so
//! a matcher built from a custom vocabulary recognizes its products and
//! units.

mod extract;
mod intents;

pub use extract::{ExtractedAmount, ExtractedEntities, ExtractedQuantity};
pub use intents::TransactionIntent;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::{Result, TextProcessingError};
use crate::text::fold;
use extract::NUM;
use voice_ledger_config::MarketVocabularyConfig;

/// Result of scoring one intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub intent: TransactionIntent,
    /// Confidence cleared the intent's threshold
    pub matched: bool,
    /// Confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Pattern texts that fired
    pub matched_patterns: Vec<String>,
    /// Entities found in the utterance
    pub extracted: ExtractedEntities,
}

/// Confidence per intent for one utterance
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentScores {
    pub price_inquiry: f32,
    pub price_quote: f32,
    pub negotiation: f32,
    pub agreement: f32,
    pub payment_confirmation: f32,
    pub cancellation: f32,
}

impl IntentScores {
    pub fn get(&self, intent: TransactionIntent) -> f32 {
        match intent {
            TransactionIntent::PriceInquiry => self.price_inquiry,
            TransactionIntent::PriceQuote => self.price_quote,
            TransactionIntent::Negotiation => self.negotiation,
            TransactionIntent::Agreement => self.agreement,
            TransactionIntent::PaymentConfirmation => self.payment_confirmation,
            TransactionIntent::Cancellation => self.cancellation,
        }
    }

    /// Check whether an intent cleared its threshold
    pub fn is_match(&self, intent: TransactionIntent) -> bool {
        self.get(intent) > intent.threshold()
    }

    /// Highest-scoring intent that cleared its threshold
    pub fn best(&self) -> Option<(TransactionIntent, f32)> {
        TransactionIntent::ALL
            .iter()
            .filter(|intent| self.is_match(**intent))
            .map(|intent| (*intent, self.get(*intent)))
            .fold(None, |best, candidate| match best {
                Some((_, score)) if score >= candidate.1 => best,
                _ => Some(candidate),
            })
    }

    fn set(&mut self, intent: TransactionIntent, score: f32) {
        match intent {
            TransactionIntent::PriceInquiry => self.price_inquiry = score,
            TransactionIntent::PriceQuote => self.price_quote = score,
            TransactionIntent::Negotiation => self.negotiation = score,
            TransactionIntent::Agreement => self.agreement = score,
            TransactionIntent::PaymentConfirmation => self.payment_confirmation = score,
            TransactionIntent::Cancellation => self.cancellation = score,
        }
    }
}

/// Intent matcher and raw entity extractor
///
/// Holds only compiled patterns; safe to share across threads.
pub struct PatternMatcher {
    product_pattern: Option<Regex>,
    unit_quantity: Regex,
    qualifier_quantity: Option<Regex>,
    per_unit: Regex,
    unit_words: Vec<String>,
}

impl PatternMatcher {
    /// Create a matcher for the built-in Ghana market vocabulary
    pub fn new() -> Self {
        Self::with_vocabulary(&MarketVocabularyConfig::default())
            .expect("built-in vocabulary patterns compile")
    }

    /// Create a matcher for a custom vocabulary
    pub fn with_vocabulary(vocabulary: &MarketVocabularyConfig) -> Result<Self> {
        let product_terms = vocabulary
            .product_terms()
            .iter()
            .map(|term| fold(term))
            .collect();
        let product_pattern = alternation(product_terms)
            .map(|terms| compile("product", &format!(r"\b(?:{terms})\b")))
            .transpose()?;

        let mut unit_words: Vec<String> = vocabulary
            .unit_synonyms
            .keys()
            .map(|unit| fold(unit))
            .collect();
        unit_words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let units = alternation(unit_words.clone()).ok_or_else(|| {
            TextProcessingError::Vocabulary("vocabulary defines no units".to_string())
        })?;

        let qualifiers = alternation(
            vocabulary
                .quantity_multipliers
                .keys()
                .map(|word| fold(word))
                .collect(),
        );

        let unit_quantity = match &qualifiers {
            Some(quals) => compile(
                "unit_quantity",
                &format!(
                    r"\b(?:({quals})\s+(?:of\s+)?)?({num})\s*(?:({quals})\s+)?(?:of\s+)?({units})\b",
                    num = *NUM
                ),
            )?,
            None => compile(
                "unit_quantity",
                &format!(r"\b()({num})\s*()(?:of\s+)?({units})\b", num = *NUM),
            )?,
        };

        let qualifier_quantity = qualifiers
            .map(|quals| {
                compile(
                    "qualifier_quantity",
                    &format!(
                        r"\b(?:({num})\s+)?({quals})\b(?:\s+(?:of\s+)?({units})\b)?",
                        num = *NUM
                    ),
                )
            })
            .transpose()?;

        let per_unit = compile("per_unit", &format!(r"\b(?:per|a|each)\s+({units})\b"))?;

        tracing::debug!(
            products = vocabulary.products.len(),
            units = unit_words.len(),
            "Compiled market vocabulary patterns"
        );

        Ok(Self {
            product_pattern,
            unit_quantity,
            qualifier_quantity,
            per_unit,
            unit_words,
        })
    }

    /// Score every intent for an utterance
    pub fn scores(&self, text: &str) -> IntentScores {
        self.analyze(text).0
    }

    /// Score every intent and extract entities in one pass
    pub fn analyze(&self, text: &str) -> (IntentScores, ExtractedEntities) {
        let folded = fold(text);
        let entities = self.extract_folded(&folded);
        let mut scores = IntentScores::default();
        for intent in TransactionIntent::ALL {
            let (score, _) = self.score_folded(intent, &folded, &entities);
            scores.set(intent, score);
        }
        (scores, entities)
    }

    /// Score one intent
    pub fn match_intent(&self, text: &str, intent: TransactionIntent) -> MatchResult {
        let folded = fold(text);
        let extracted = self.extract_folded(&folded);
        let (confidence, matched_patterns) = self.score_folded(intent, &folded, &extracted);
        MatchResult {
            intent,
            matched: confidence > intent.threshold(),
            confidence,
            matched_patterns,
            extracted,
        }
    }

    /// Score every intent, in [`TransactionIntent::ALL`] order
    pub fn match_all(&self, text: &str) -> Vec<MatchResult> {
        TransactionIntent::ALL
            .iter()
            .map(|intent| self.match_intent(text, *intent))
            .collect()
    }

    pub fn check_price_inquiry(&self, text: &str) -> MatchResult {
        self.match_intent(text, TransactionIntent::PriceInquiry)
    }

    pub fn check_price_quote(&self, text: &str) -> MatchResult {
        self.match_intent(text, TransactionIntent::PriceQuote)
    }

    pub fn check_negotiation(&self, text: &str) -> MatchResult {
        self.match_intent(text, TransactionIntent::Negotiation)
    }

    pub fn check_agreement(&self, text: &str) -> MatchResult {
        self.match_intent(text, TransactionIntent::Agreement)
    }

    pub fn check_payment(&self, text: &str) -> MatchResult {
        self.match_intent(text, TransactionIntent::PaymentConfirmation)
    }

    pub fn check_cancellation(&self, text: &str) -> MatchResult {
        self.match_intent(text, TransactionIntent::Cancellation)
    }

    /// Extract amount, product and quantity regardless of intent
    pub fn extract_entities(&self, text: &str) -> ExtractedEntities {
        self.extract_folded(&fold(text))
    }

    /// Extract the first spoken amount
    pub fn extract_amount(&self, text: &str) -> Option<ExtractedAmount> {
        let folded = fold(text);
        let skip = self.quantity_span(&folded);
        extract::extract_amount(&folded, skip.as_ref())
    }

    /// Extract the raw product term (vocabulary term or contextual noun)
    pub fn extract_product(&self, text: &str) -> Option<String> {
        self.extract_product_folded(&fold(text))
    }

    /// Extract the raw quantity
    pub fn extract_quantity(&self, text: &str) -> Option<ExtractedQuantity> {
        self.extract_quantity_folded(&fold(text)).map(|(quantity, _)| quantity)
    }

    fn extract_folded(&self, folded: &str) -> ExtractedEntities {
        let quantity = self.extract_quantity_folded(folded);
        let skip = quantity
            .as_ref()
            .filter(|(q, _)| !q.per_unit)
            .map(|(_, span)| span.clone());
        ExtractedEntities {
            amount: extract::extract_amount(folded, skip.as_ref()),
            product: self.extract_product_folded(folded),
            quantity: quantity.map(|(q, _)| q),
        }
    }

    fn extract_product_folded(&self, folded: &str) -> Option<String> {
        self.product_pattern
            .as_ref()
            .and_then(|pattern| pattern.find(folded))
            .map(|m| m.as_str().to_string())
            .or_else(|| extract::extract_context_product(folded, &self.unit_words))
    }

    fn quantity_span(&self, folded: &str) -> Option<Range<usize>> {
        self.extract_quantity_folded(folded)
            .filter(|(q, _)| !q.per_unit)
            .map(|(_, span)| span)
    }

    fn extract_quantity_folded(&self, folded: &str) -> Option<(ExtractedQuantity, Range<usize>)> {
        if let Some(caps) = self.unit_quantity.captures(folded) {
            let whole = caps.get(0)?;
            let qualifier = caps
                .get(1)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
                .filter(|q| !q.is_empty());
            return Some((
                ExtractedQuantity {
                    value: caps.get(2).map(|m| m.as_str().trim().to_string()),
                    unit: caps.get(4).map(|m| m.as_str().to_string()),
                    qualifier,
                    per_unit: false,
                    text: whole.as_str().to_string(),
                },
                whole.range(),
            ));
        }

        if let Some(caps) = self
            .qualifier_quantity
            .as_ref()
            .and_then(|pattern| pattern.captures(folded))
        {
            let whole = caps.get(0)?;
            return Some((
                ExtractedQuantity {
                    value: caps.get(1).map(|m| m.as_str().trim().to_string()),
                    unit: caps.get(3).map(|m| m.as_str().to_string()),
                    qualifier: caps.get(2).map(|m| m.as_str().to_string()),
                    per_unit: false,
                    text: whole.as_str().to_string(),
                },
                whole.range(),
            ));
        }

        if let Some(count) = extract::extract_count(folded) {
            return Some(count);
        }

        let caps = self.per_unit.captures(folded)?;
        let whole = caps.get(0)?;
        Some((
            ExtractedQuantity {
                value: None,
                unit: caps.get(1).map(|m| m.as_str().to_string()),
                qualifier: None,
                per_unit: true,
                text: whole.as_str().to_string(),
            },
            whole.range(),
        ))
    }

    fn score_folded(
        &self,
        intent: TransactionIntent,
        folded: &str,
        entities: &ExtractedEntities,
    ) -> (f32, Vec<String>) {
        let (base, hits) = intents::base_score(intent, folded);
        let score = match intent {
            TransactionIntent::PriceInquiry if base > 0.0 => {
                let mut score = base;
                if entities.product.is_some() {
                    score += 0.1;
                }
                if folded.contains('?') {
                    score += 0.05;
                }
                score
            }
            TransactionIntent::PriceQuote => match &entities.amount {
                Some(amount) if amount.has_currency() => base.max(0.8) + 0.1,
                Some(_) if base > 0.0 => base + 0.05,
                _ => base * 0.5,
            },
            TransactionIntent::Negotiation if base > 0.0 && entities.amount.is_some() => {
                base + 0.05
            }
            _ => base,
        };
        (voice_ledger_core::clamp_confidence(score), hits)
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn alternation(mut terms: Vec<String>) -> Option<String> {
    terms.retain(|term| !term.trim().is_empty());
    if terms.is_empty() {
        return None;
    }
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    terms.dedup();
    Some(
        terms
            .iter()
            .map(|term| regex::escape(term))
            .collect::<Vec<_>>()
            .join("|"),
    )
}

fn compile(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| TextProcessingError::Pattern {
        name: name.to_string(),
        source,
    })
}
