//! Raw entity extraction
//!
//! Pulls candidate amounts, products and quantities out of folded utterance
//! text. Values stay as raw text here; [`crate::normalization`] turns them
//! into canonical numbers and names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

use crate::numbers::NUMBER_WORDS;

/// Amount as spoken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAmount {
    /// Numeric text in the spoken unit ("25", "twenty five", "500")
    pub value: String,
    /// Minor-unit part of a compound amount ("50" in "2 cedis 50 pesewas")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor_value: Option<String>,
    /// Currency token as spoken ("cedis", "pesewas", "gh₵"); `None` if bare
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Original text span
    pub text: String,
}

impl ExtractedAmount {
    pub fn has_currency(&self) -> bool {
        self.currency.is_some()
    }
}

/// Quantity as spoken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedQuantity {
    /// Numeric text ("2", "two"); `None` for "plenty" or "per kilo"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Qualitative word modifying the value ("plenty", "couple")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    /// Unit pricing ("per kilo") rather than a purchased amount
    #[serde(default)]
    pub per_unit: bool,
    /// Original text span
    pub text: String,
}

/// All raw entities found in one utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub amount: Option<ExtractedAmount>,
    pub product: Option<String>,
    pub quantity: Option<ExtractedQuantity>,
}

impl ExtractedEntities {
    /// Check if any entities were extracted
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.product.is_none() && self.quantity.is_none()
    }

    /// Flatten into string fields for transition records
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(ref amount) = self.amount {
            map.insert("amount".to_string(), amount.text.clone());
        }
        if let Some(ref product) = self.product {
            map.insert("product".to_string(), product.clone());
        }
        if let Some(ref quantity) = self.quantity {
            map.insert("quantity".to_string(), quantity.text.clone());
            if let Some(ref unit) = quantity.unit {
                map.insert("unit".to_string(), unit.clone());
            }
        }
        map
    }

    /// Merge with another set, preferring non-None values from `other`
    pub fn merge(&mut self, other: &ExtractedEntities) {
        if other.amount.is_some() {
            self.amount = other.amount.clone();
        }
        if other.product.is_some() {
            self.product = other.product.clone();
        }
        if other.quantity.is_some() {
            self.quantity = other.quantity.clone();
        }
    }
}

/// A number as digits or a run of number words
pub(crate) static NUM: Lazy<String> = Lazy::new(|| {
    format!(
        r"(?:\d+(?:\.\d+)?|(?:{w}|an|a)\b(?:[\s-]+(?:{w}|and)\b)*)",
        w = NUMBER_WORDS
    )
});

const MAJOR_CURRENCY: &str = r"(?:ghana\s+)?(?:cedis?|sidi|sedi|gh[sc₵¢])";

// "2 cedis 50 pesewas"
static COMPOUND_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b({num})\s*({major})\s*(?:and\s+)?({num})\s*pesewas?\b",
        num = *NUM,
        major = MAJOR_CURRENCY
    ))
    .unwrap()
});

// "gh₵ 25", "₵25"
static PREFIX_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(gh[sc₵¢]|₵|¢)\s*(\d+(?:[.,]\d+)*)").unwrap()
});

// "25 cedis", "twenty five cedis", "500 pesewas"
static SUFFIX_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b({num})\s*({major}|pesewas?)",
        num = *NUM,
        major = MAJOR_CURRENCY
    ))
    .unwrap()
});

// "I'll take 2", "give me three": a count with no unit
static COUNT_QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?:take|give\s+me|want|buy)\s+(\d+(?:\.\d+)?|(?:{w})\b(?:[\s-]+(?:{w}|and)\b)*)",
        w = NUMBER_WORDS
    ))
    .unwrap()
});

static CURRENCY_AHEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\s*(?:{major}|pesewas?)", major = MAJOR_CURRENCY)).unwrap()
});

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").unwrap());

// Words that follow "for"/"of" but are never products
const PRODUCT_STOPWORDS: &[&str] = &[
    "it", "this", "that", "these", "those", "them", "me", "you", "him", "her", "us", "one",
    "ones", "how", "what", "price", "much", "money", "cash", "cedi", "cedis", "pesewa",
    "pesewas", "the", "some", "all", "each", "real", "sure", "now", "today", "free",
];

static CONTEXT_PRODUCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:for|of|buy|buying|sell|selling|want|need)\s+(?:the\s+|some\s+|your\s+|my\s+|this\s+|that\s+|these\s+|a\s+|an\s+)?([a-z][a-z'-]{2,})\b",
    )
    .unwrap()
});

/// Find the first spoken amount in folded text
pub(crate) fn extract_amount(text: &str, skip: Option<&Range<usize>>) -> Option<ExtractedAmount> {
    if let Some(caps) = COMPOUND_AMOUNT.captures(text) {
        return Some(ExtractedAmount {
            value: caps.get(1)?.as_str().trim().to_string(),
            minor_value: Some(caps.get(3)?.as_str().trim().to_string()),
            currency: Some(caps.get(2)?.as_str().to_string()),
            text: caps.get(0)?.as_str().to_string(),
        });
    }

    if let Some(caps) = PREFIX_AMOUNT.captures(text) {
        return Some(ExtractedAmount {
            value: caps.get(2)?.as_str().to_string(),
            minor_value: None,
            currency: Some(caps.get(1)?.as_str().to_string()),
            text: caps.get(0)?.as_str().to_string(),
        });
    }

    if let Some(caps) = SUFFIX_AMOUNT.captures(text) {
        return Some(ExtractedAmount {
            value: caps.get(1)?.as_str().trim().to_string(),
            minor_value: None,
            currency: Some(caps.get(2)?.as_str().to_string()),
            text: caps.get(0)?.as_str().to_string(),
        });
    }

    // Bare number, as in "it's 30" or "I can do 20". Numbers that belong to a
    // quantity ("2 bowls") or look like phone numbers are not prices.
    BARE_NUMBER
        .find_iter(text)
        .filter(|m| skip.map_or(true, |range| !overlaps(range, &m.range())))
        .find(|m| m.as_str().len() <= 6)
        .map(|m| ExtractedAmount {
            value: m.as_str().to_string(),
            minor_value: None,
            currency: None,
            text: m.as_str().to_string(),
        })
}

/// Bare count after a buying verb; a number followed by a currency is a price
pub(crate) fn extract_count(text: &str) -> Option<(ExtractedQuantity, Range<usize>)> {
    let caps = COUNT_QUANTITY.captures(text)?;
    let whole = caps.get(0)?;
    let value = caps.get(1)?;
    if CURRENCY_AHEAD.is_match(&text[whole.end()..]) {
        return None;
    }
    Some((
        ExtractedQuantity {
            value: Some(value.as_str().trim().to_string()),
            unit: None,
            qualifier: None,
            per_unit: false,
            text: whole.as_str().to_string(),
        },
        value.range(),
    ))
}

/// Fallback product extraction from sentence context ("a bag of X")
pub(crate) fn extract_context_product(text: &str, unit_words: &[String]) -> Option<String> {
    CONTEXT_PRODUCT
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .find(|word| {
            !PRODUCT_STOPWORDS.contains(&word.as_str())
                && !unit_words.iter().any(|u| u == word)
                && crate::numbers::word_to_number(word).is_none()
        })
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
