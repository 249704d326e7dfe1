//! Transaction records produced by the detection engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalization step applied to an extracted value
///
/// Kept on every `TransactionData` so a reviewer can see how "500 pesewas"
/// became `5.00`, and so a later correction can target the original token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationRecord {
    /// Field name (`amount`, `product`, `quantity`)
    pub field: String,
    /// Raw text as extracted
    pub original: String,
    /// Canonical value after normalization
    pub normalized: String,
    /// Whether a mapping (unit conversion, synonym, multiplier) was applied
    pub mapped: bool,
}

impl NormalizationRecord {
    pub fn new(
        field: impl Into<String>,
        original: impl Into<String>,
        normalized: impl Into<String>,
        mapped: bool,
    ) -> Self {
        Self {
            field: field.into(),
            original: original.into(),
            normalized: normalized.into(),
            mapped,
        }
    }
}

/// Structured sale data assembled from normalized entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionData {
    /// Amount in the canonical (major) currency unit
    pub amount: f64,
    /// Canonical currency code
    pub currency: String,
    /// Canonical product name
    pub product: String,
    /// Product category if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Overall confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Every normalization applied while building this record
    #[serde(default)]
    pub normalizations: Vec<NormalizationRecord>,
}

/// A detected market sale, handed to the storage collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// Start of the conversation that produced the sale
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub currency: String,
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,
    pub confidence: f32,
    /// Redacted, length-capped excerpt of the closing utterances
    pub transcript_snippet: String,
    /// Confidence fell below the acceptance threshold
    pub needs_review: bool,
    /// Set by the sync collaborator once uploaded
    #[serde(default)]
    pub synced: bool,
}

impl Transaction {
    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        match (self.quantity, self.unit.as_deref()) {
            (Some(qty), Some(unit)) => format!(
                "{} {} {} for {} {:.2}",
                format_quantity(qty),
                unit,
                self.product,
                self.currency,
                self.amount
            ),
            (Some(qty), None) => format!(
                "{} x {} for {} {:.2}",
                format_quantity(qty),
                self.product,
                self.currency,
                self.amount
            ),
            _ => format!("{} for {} {:.2}", self.product, self.currency, self.amount),
        }
    }
}

fn format_quantity(qty: f64) -> String {
    if qty.fract() == 0.0 {
        format!("{}", qty as i64)
    } else {
        format!("{:.1}", qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction {
            id: "tx-1".to_string(),
            timestamp: Utc::now(),
            amount: 25.0,
            currency: "GHS".to_string(),
            product: "Tilapia".to_string(),
            quantity: Some(2.0),
            unit: Some("kg".to_string()),
            customer_id: Some("customer-1".to_string()),
            seller_id: None,
            confidence: 0.9,
            transcript_snippet: "How much for tilapia?".to_string(),
            needs_review: false,
            synced: false,
        }
    }

    #[test]
    fn test_summary() {
        let tx = sample();
        assert_eq!(tx.summary(), "2 kg Tilapia for GHS 25.00");

        let tx = Transaction {
            quantity: None,
            unit: None,
            ..sample()
        };
        assert_eq!(tx.summary(), "Tilapia for GHS 25.00");
    }

    #[test]
    fn test_synced_defaults_false() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value.as_object_mut().unwrap().remove("synced");
        let tx: Transaction = serde_json::from_value(value).unwrap();
        assert!(!tx.synced);
    }
}
