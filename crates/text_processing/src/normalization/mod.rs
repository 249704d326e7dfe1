//! Entity Normalization
//!
//! Converts raw extracted entities into canonical values:
//! - Amounts: pesewas to cedis, spoken numbers to digits, rounded to 2dp
//! - Products: local-language and slang names to the vocabulary's canonical
//!   name, title-cased fallback for unknown products
//! - Quantities: unit synonyms ("bowls" -> "bowl") and qualitative
//!   multipliers ("plenty", "couple")
//!
//! Normalization never fails past its own boundary. A malformed value comes
//! back with confidence 0.0 and an `error` describing the problem.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::numbers::parse_number;
use crate::patterns::{ExtractedAmount, ExtractedEntities, ExtractedQuantity};
use crate::text::{fold, title_case};
use voice_ledger_config::{CurrencyConfig, MarketVocabularyConfig};
use voice_ledger_core::{clamp_confidence, NormalizationRecord, TransactionData};

const EXPLICIT_CURRENCY_CONFIDENCE: f32 = 0.95;
const IMPLIED_CURRENCY_CONFIDENCE: f32 = 0.75;
const MAPPED_PRODUCT_CONFIDENCE: f32 = 0.95;
const UNMAPPED_PRODUCT_CONFIDENCE: f32 = 0.6;

/// Amount in the canonical currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAmount {
    /// Major-unit value, rounded to 2 decimal places
    pub value: f64,
    pub original: String,
    /// Canonical currency code
    pub currency: String,
    pub confidence: f32,
    /// Conversion applied (minor unit, spoken number, currency symbol)
    pub was_normalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NormalizedAmount {
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.value > 0.0
    }
}

/// Canonical product name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub original: String,
    pub confidence: f32,
    /// Found in the synonym table
    pub was_normalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NormalizedProduct {
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && !self.name.trim().is_empty()
    }
}

/// Quantity with canonical unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuantity {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub original: String,
    pub confidence: f32,
    /// Unit synonym or multiplier applied
    pub was_normalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NormalizedQuantity {
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.value > 0.0
    }
}

/// All normalized entities of one utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEntityResult {
    pub amount: Option<NormalizedAmount>,
    pub product: Option<NormalizedProduct>,
    pub quantity: Option<NormalizedQuantity>,
    /// Mean confidence of the entities present, 0.0 if none
    pub overall_confidence: f32,
    pub normalizations: Vec<NormalizationRecord>,
}

impl NormalizedEntityResult {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.product.is_none() && self.quantity.is_none()
    }

    /// Swap in a product resolved elsewhere (e.g. a learned vocabulary
    /// entry), refreshing its audit record and the overall confidence
    pub fn replace_product(&mut self, product: NormalizedProduct) {
        self.normalizations.retain(|record| record.field != "product");
        if product.error.is_none() {
            self.normalizations.push(NormalizationRecord::new(
                "product",
                &product.original,
                &product.name,
                product.was_normalized,
            ));
        }
        self.product = Some(product);
        self.overall_confidence = self.mean_confidence();
    }

    fn mean_confidence(&self) -> f32 {
        let confidences: Vec<f32> = [
            self.amount.as_ref().map(|a| a.confidence),
            self.product.as_ref().map(|p| p.confidence),
            self.quantity.as_ref().map(|q| q.confidence),
        ]
        .into_iter()
        .flatten()
        .collect();
        if confidences.is_empty() {
            0.0
        } else {
            clamp_confidence(confidences.iter().sum::<f32>() / confidences.len() as f32)
        }
    }
}

/// Entity normalizer backed by a market vocabulary
///
/// Immutable after construction; safe to share across threads.
pub struct EntityNormalizer {
    product_synonyms: HashMap<String, (String, Option<String>)>,
    unit_synonyms: HashMap<String, String>,
    quantity_multipliers: HashMap<String, f64>,
    currency: CurrencyConfig,
}

impl EntityNormalizer {
    /// Normalizer for the built-in Ghana market vocabulary
    pub fn new() -> Self {
        Self::with_config(&MarketVocabularyConfig::default(), &CurrencyConfig::default())
    }

    pub fn with_config(vocabulary: &MarketVocabularyConfig, currency: &CurrencyConfig) -> Self {
        let product_synonyms = vocabulary
            .product_synonyms()
            .into_iter()
            .map(|(term, canonical)| (fold(&term), canonical))
            .collect();
        let unit_synonyms = vocabulary
            .unit_synonyms
            .iter()
            .map(|(raw, unit)| (fold(raw), unit.clone()))
            .collect();
        let quantity_multipliers = vocabulary
            .quantity_multipliers
            .iter()
            .map(|(word, factor)| (fold(word), *factor))
            .collect();

        Self {
            product_synonyms,
            unit_synonyms,
            quantity_multipliers,
            currency: currency.clone(),
        }
    }

    /// Canonical currency code
    pub fn currency_code(&self) -> &str {
        &self.currency.code
    }

    /// Normalize a spoken amount to the major currency unit
    pub fn normalize_amount(&self, raw: &ExtractedAmount) -> NormalizedAmount {
        let failed = |message: String| NormalizedAmount {
            value: 0.0,
            original: raw.text.clone(),
            currency: self.currency.code.clone(),
            confidence: 0.0,
            was_normalized: false,
            error: Some(message),
        };

        let Some(major) = parse_number(&raw.value) else {
            return failed(format!("Malformed amount: '{}'", raw.value));
        };
        let divisor = f64::from(self.currency.minor_per_major.max(1));
        let is_minor = raw
            .currency
            .as_deref()
            .map(|c| self.is_minor_unit(c))
            .unwrap_or(false);

        let mut value = if is_minor { major / divisor } else { major };
        if let Some(ref minor_text) = raw.minor_value {
            let Some(minor) = parse_number(minor_text) else {
                return failed(format!("Malformed amount: '{}'", minor_text));
            };
            value += minor / divisor;
        }

        let spoken = !raw.value.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',');
        let symbol = raw
            .currency
            .as_deref()
            .map(|c| !c.chars().all(|ch| ch.is_alphabetic() || ch.is_whitespace()))
            .unwrap_or(false);

        NormalizedAmount {
            value: round_cents(value.max(0.0)),
            original: raw.text.clone(),
            currency: self.currency.code.clone(),
            confidence: if raw.has_currency() {
                EXPLICIT_CURRENCY_CONFIDENCE
            } else {
                IMPLIED_CURRENCY_CONFIDENCE
            },
            was_normalized: is_minor || raw.minor_value.is_some() || spoken || symbol,
            error: None,
        }
    }

    /// Map a product token to its canonical name
    pub fn normalize_product(&self, raw: &str) -> NormalizedProduct {
        let key = fold(raw);
        if key.is_empty() {
            return NormalizedProduct {
                name: String::new(),
                category: None,
                original: raw.to_string(),
                confidence: 0.0,
                was_normalized: false,
                error: Some("Empty product name".to_string()),
            };
        }

        match self.lookup_product(&key) {
            Some((name, category)) => NormalizedProduct {
                name: name.clone(),
                category: category.clone(),
                original: raw.to_string(),
                confidence: MAPPED_PRODUCT_CONFIDENCE,
                was_normalized: true,
                error: None,
            },
            None => NormalizedProduct {
                name: title_case(&key),
                category: None,
                original: raw.to_string(),
                confidence: UNMAPPED_PRODUCT_CONFIDENCE,
                was_normalized: false,
                error: None,
            },
        }
    }

    /// Map units to canonical names and apply qualitative multipliers
    pub fn normalize_quantity(&self, raw: &ExtractedQuantity) -> NormalizedQuantity {
        let unit = raw.unit.as_deref().map(fold);
        let canonical_unit = unit
            .as_deref()
            .map(|u| self.unit_synonyms.get(u).cloned().unwrap_or_else(|| u.to_string()));
        let unit_mapped = match (&unit, &canonical_unit) {
            (Some(raw_unit), Some(canonical)) => raw_unit != canonical,
            _ => false,
        };

        if raw.per_unit {
            return NormalizedQuantity {
                value: 1.0,
                unit: canonical_unit,
                original: raw.text.clone(),
                confidence: 0.7,
                was_normalized: unit_mapped,
                error: None,
            };
        }

        let base = match raw.value.as_deref() {
            Some(text) => match parse_number(text) {
                Some(value) => value,
                None => {
                    return NormalizedQuantity {
                        value: 0.0,
                        unit: canonical_unit,
                        original: raw.text.clone(),
                        confidence: 0.0,
                        was_normalized: false,
                        error: Some(format!("Malformed quantity: '{}'", text)),
                    }
                }
            },
            None => 1.0,
        };

        let multiplier = raw
            .qualifier
            .as_deref()
            .and_then(|q| self.quantity_multipliers.get(&fold(q)).copied());
        let value = base * multiplier.unwrap_or(1.0);

        let confidence = if multiplier.is_some() {
            0.6
        } else if canonical_unit.is_some() {
            0.9
        } else {
            0.8
        };

        NormalizedQuantity {
            value,
            unit: canonical_unit,
            original: raw.text.clone(),
            confidence,
            was_normalized: unit_mapped || multiplier.is_some(),
            error: (value <= 0.0).then(|| format!("Quantity must be positive: {}", value)),
        }
    }

    /// Normalize all present entities and record the mappings applied
    pub fn normalize_entities(&self, entities: &ExtractedEntities) -> NormalizedEntityResult {
        let amount = entities.amount.as_ref().map(|a| self.normalize_amount(a));
        let product = entities.product.as_deref().map(|p| self.normalize_product(p));
        let quantity = entities.quantity.as_ref().map(|q| self.normalize_quantity(q));

        let mut normalizations = Vec::new();
        if let Some(ref a) = amount {
            if a.error.is_none() {
                normalizations.push(NormalizationRecord::new(
                    "amount",
                    &a.original,
                    format!("{:.2} {}", a.value, a.currency),
                    a.was_normalized,
                ));
            }
        }
        if let Some(ref p) = product {
            if p.error.is_none() {
                normalizations.push(NormalizationRecord::new(
                    "product",
                    &p.original,
                    &p.name,
                    p.was_normalized,
                ));
            }
        }
        if let Some(ref q) = quantity {
            if q.error.is_none() {
                let normalized = match q.unit {
                    Some(ref unit) => format!("{} {}", q.value, unit),
                    None => q.value.to_string(),
                };
                normalizations.push(NormalizationRecord::new(
                    "quantity",
                    &q.original,
                    normalized,
                    q.was_normalized,
                ));
            }
        }

        let mut result = NormalizedEntityResult {
            amount,
            product,
            quantity,
            overall_confidence: 0.0,
            normalizations,
        };
        result.overall_confidence = result.mean_confidence();
        result
    }

    /// Assemble sale data; `None` unless amount and product are both valid
    pub fn create_transaction_data(
        &self,
        normalized: &NormalizedEntityResult,
    ) -> Option<TransactionData> {
        let amount = normalized.amount.as_ref().filter(|a| a.is_valid())?;
        let product = normalized.product.as_ref().filter(|p| p.is_valid())?;
        let quantity = normalized.quantity.as_ref().filter(|q| q.is_valid());

        Some(TransactionData {
            amount: amount.value,
            currency: amount.currency.clone(),
            product: product.name.clone(),
            category: product.category.clone(),
            quantity: quantity.map(|q| q.value),
            unit: quantity.and_then(|q| q.unit.clone()),
            confidence: normalized.overall_confidence,
            normalizations: normalized.normalizations.clone(),
        })
    }

    fn lookup_product(&self, key: &str) -> Option<&(String, Option<String>)> {
        self.product_synonyms.get(key).or_else(|| {
            // "tilapias" when only "tilapia" is listed
            key.strip_suffix("es")
                .and_then(|stem| self.product_synonyms.get(stem))
                .or_else(|| key.strip_suffix('s').and_then(|stem| self.product_synonyms.get(stem)))
        })
    }

    fn is_minor_unit(&self, currency: &str) -> bool {
        let minor = fold(&self.currency.minor_unit);
        fold(currency).starts_with(&minor)
    }
}

impl Default for EntityNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(value: &str, currency: Option<&str>) -> ExtractedAmount {
        ExtractedAmount {
            value: value.to_string(),
            minor_value: None,
            currency: currency.map(str::to_string),
            text: value.to_string(),
        }
    }

    fn quantity(value: Option<&str>, unit: Option<&str>, qualifier: Option<&str>) -> ExtractedQuantity {
        ExtractedQuantity {
            value: value.map(str::to_string),
            unit: unit.map(str::to_string),
            qualifier: qualifier.map(str::to_string),
            per_unit: false,
            text: "raw".to_string(),
        }
    }

    #[test]
    fn test_pesewas_to_cedis() {
        let normalizer = EntityNormalizer::new();
        let result = normalizer.normalize_amount(&amount("500", Some("pesewas")));
        assert_eq!(result.value, 5.0);
        assert_eq!(result.currency, "GHS");
        assert!(result.was_normalized);
        assert!(result.is_valid());
    }

    #[test]
    fn test_cedis_unchanged() {
        let normalizer = EntityNormalizer::new();
        let result = normalizer.normalize_amount(&amount("25", Some("cedis")));
        assert_eq!(result.value, 25.0);
        assert!(!result.was_normalized);
        assert!((result.confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_unspecified_currency_defaults_to_major() {
        let normalizer = EntityNormalizer::new();
        let result = normalizer.normalize_amount(&amount("12", None));
        assert_eq!(result.value, 12.0);
        assert!(result.confidence < 0.95);
    }

    #[test]
    fn test_compound_amount() {
        let normalizer = EntityNormalizer::new();
        let mut raw = amount("2", Some("cedis"));
        raw.minor_value = Some("50".to_string());
        assert_eq!(normalizer.normalize_amount(&raw).value, 2.5);
    }

    #[test]
    fn test_spoken_amount_rounds() {
        let normalizer = EntityNormalizer::new();
        let result = normalizer.normalize_amount(&amount("one hundred and five", Some("pesewas")));
        assert_eq!(result.value, 1.05);
        assert!(result.was_normalized);
    }

    #[test]
    fn test_malformed_amount() {
        let normalizer = EntityNormalizer::new();
        let result = normalizer.normalize_amount(&amount("lots", Some("cedis")));
        assert_eq!(result.confidence, 0.0);
        assert!(result.error.is_some());
        assert!(!result.is_valid());
        assert!(result.value >= 0.0);
    }

    #[test]
    fn test_product_synonyms() {
        let normalizer = EntityNormalizer::new();
        let result = normalizer.normalize_product("bankye");
        assert_eq!(result.name, "Cassava");
        assert_eq!(result.category.as_deref(), Some("Tubers"));
        assert!(result.was_normalized);

        assert_eq!(normalizer.normalize_product("tilapia").name, "Tilapia");
        assert_eq!(normalizer.normalize_product("Ntoos").name, "Tomatoes");
    }

    #[test]
    fn test_unknown_product_title_cased() {
        let normalizer = EntityNormalizer::new();
        let result = normalizer.normalize_product("dried  mangoes");
        assert_eq!(result.name, "Dried Mangoes");
        assert!(!result.was_normalized);
        assert!(result.is_valid());
    }

    #[test]
    fn test_blank_product() {
        let normalizer = EntityNormalizer::new();
        let result = normalizer.normalize_product("   ");
        assert!(!result.is_valid());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_quantity_units() {
        let normalizer = EntityNormalizer::new();
        let result = normalizer.normalize_quantity(&quantity(Some("2"), Some("bowls"), None));
        assert_eq!(result.value, 2.0);
        assert_eq!(result.unit.as_deref(), Some("bowl"));
        assert!(result.was_normalized);

        let kilos = normalizer.normalize_quantity(&quantity(Some("three"), Some("kilos"), None));
        assert_eq!(kilos.value, 3.0);
        assert_eq!(kilos.unit.as_deref(), Some("kg"));
    }

    #[test]
    fn test_quantity_multiplier() {
        let normalizer = EntityNormalizer::new();
        let couple = normalizer.normalize_quantity(&quantity(Some("a"), Some("bowls"), Some("couple")));
        assert_eq!(couple.value, 2.0);

        let plenty = normalizer.normalize_quantity(&quantity(None, None, Some("plenty")));
        assert_eq!(plenty.value, 5.0);
        assert!((plenty.confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_overall_confidence_excludes_missing() {
        let normalizer = EntityNormalizer::new();
        let entities = ExtractedEntities {
            amount: Some(amount("25", Some("cedis"))),
            product: Some("tilapia".to_string()),
            quantity: None,
        };
        let result = normalizer.normalize_entities(&entities);
        assert!((result.overall_confidence - 0.95).abs() < 1e-6);
        assert_eq!(result.normalizations.len(), 2);
    }

    #[test]
    fn test_replace_product_refreshes_confidence() {
        let normalizer = EntityNormalizer::new();
        let mut result = normalizer.normalize_entities(&ExtractedEntities {
            amount: Some(amount("10", Some("cedis"))),
            product: Some("shito".to_string()),
            quantity: None,
        });
        assert!((result.overall_confidence - 0.775).abs() < 1e-6);

        result.replace_product(NormalizedProduct {
            name: "Shito".to_string(),
            category: Some("Condiments".to_string()),
            original: "shito".to_string(),
            confidence: 0.95,
            was_normalized: true,
            error: None,
        });
        assert!((result.overall_confidence - 0.95).abs() < 1e-6);
        assert_eq!(result.normalizations.len(), 2);
        assert!(result.normalizations.iter().any(|r| r.field == "product" && r.mapped));
    }

    #[test]
    fn test_create_transaction_data() {
        let normalizer = EntityNormalizer::new();
        let entities = ExtractedEntities {
            amount: Some(amount("10", Some("cedis"))),
            product: Some("garri".to_string()),
            quantity: Some(quantity(Some("2"), Some("bowls"), None)),
        };
        let normalized = normalizer.normalize_entities(&entities);
        let data = normalizer.create_transaction_data(&normalized).unwrap();
        assert_eq!(data.amount, 10.0);
        assert_eq!(data.product, "Gari");
        assert_eq!(data.quantity, Some(2.0));
        assert_eq!(data.unit.as_deref(), Some("bowl"));
        assert_eq!(data.normalizations.len(), 3);
    }

    #[test]
    fn test_transaction_data_requires_amount_and_product() {
        let normalizer = EntityNormalizer::new();
        let missing_product = normalizer.normalize_entities(&ExtractedEntities {
            amount: Some(amount("10", None)),
            ..Default::default()
        });
        assert!(normalizer.create_transaction_data(&missing_product).is_none());

        let zero_amount = normalizer.normalize_entities(&ExtractedEntities {
            amount: Some(amount("0", Some("cedis"))),
            product: Some("yam".to_string()),
            quantity: None,
        });
        assert!(normalizer.create_transaction_data(&zero_amount).is_none());
    }
}
