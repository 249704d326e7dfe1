//! Business validation of extracted sale data
//!
//! Validation flags, it never drops. Every issue lowers the recommended
//! action at most to `Review`, except hard data errors which recommend
//! `Reject`.

use serde::{Deserialize, Serialize};

use voice_ledger_config::ValidationConfig;
use voice_ledger_core::{Product, TransactionData};

/// Issue severity, ordered from least to most serious
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

/// What the caller should do with the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Accept,
    Review,
    Reject,
}

impl RecommendedAction {
    /// Action for the most serious issue present
    pub fn from_severity(severity: Option<IssueSeverity>) -> Self {
        match severity {
            None => RecommendedAction::Accept,
            Some(IssueSeverity::Info) | Some(IssueSeverity::Warning) => RecommendedAction::Review,
            Some(IssueSeverity::Error) => RecommendedAction::Reject,
        }
    }
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessIssue {
    /// Stable machine-readable code, e.g. `AMOUNT_TOO_LOW`
    pub code: String,
    pub severity: IssueSeverity,
    pub message: String,
}

impl BusinessIssue {
    fn new(code: &str, severity: IssueSeverity, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessValidationResult {
    /// No `Error`-severity issue
    pub is_valid: bool,
    pub issues: Vec<BusinessIssue>,
    pub recommended_action: RecommendedAction,
}

impl BusinessValidationResult {
    pub fn from_issues(issues: Vec<BusinessIssue>) -> Self {
        let worst = issues.iter().map(|i| i.severity).max();
        Self {
            is_valid: worst != Some(IssueSeverity::Error),
            recommended_action: RecommendedAction::from_severity(worst),
            issues,
        }
    }

    /// Result for a transcript with nothing to validate
    pub fn failed(code: &str, message: impl Into<String>) -> Self {
        Self::from_issues(vec![BusinessIssue::new(code, IssueSeverity::Error, message)])
    }

    pub fn has_issue(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

/// Check sale data against market plausibility rules
///
/// `product` is the vocabulary record for `data.product`, `None` when the
/// product is not in the vocabulary.
pub fn validate(
    data: &TransactionData,
    product: Option<&Product>,
    rules: &ValidationConfig,
) -> BusinessValidationResult {
    let mut issues = Vec::new();

    if !data.amount.is_finite() || data.amount <= 0.0 {
        issues.push(BusinessIssue::new(
            "INVALID_AMOUNT",
            IssueSeverity::Error,
            format!("Amount must be positive, got {}", data.amount),
        ));
    } else if data.amount < rules.min_amount {
        issues.push(BusinessIssue::new(
            "AMOUNT_TOO_LOW",
            IssueSeverity::Warning,
            format!(
                "Amount {:.2} {} is below the usual minimum of {:.2}",
                data.amount, data.currency, rules.min_amount
            ),
        ));
    } else if data.amount > rules.max_amount {
        issues.push(BusinessIssue::new(
            "AMOUNT_HIGH",
            IssueSeverity::Warning,
            format!(
                "Amount {:.2} {} is above the usual maximum of {:.2}",
                data.amount, data.currency, rules.max_amount
            ),
        ));
    }

    if data.product.trim().is_empty() {
        issues.push(BusinessIssue::new(
            "MISSING_PRODUCT",
            IssueSeverity::Error,
            "No product name",
        ));
    } else {
        match product {
            Some(product) => {
                if data.amount > 0.0 && !product.price_in_range(data.amount) {
                    issues.push(BusinessIssue::new(
                        "PRICE_OUT_OF_RANGE",
                        IssueSeverity::Warning,
                        format!(
                            "{:.2} {} is outside the usual price range for {}",
                            data.amount, data.currency, product.name
                        ),
                    ));
                }
            },
            None => issues.push(BusinessIssue::new(
                "UNKNOWN_PRODUCT",
                IssueSeverity::Info,
                format!("'{}' is not in the product vocabulary", data.product),
            )),
        }
    }

    if let Some(quantity) = data.quantity {
        if quantity > rules.max_quantity {
            issues.push(BusinessIssue::new(
                "QUANTITY_HIGH",
                IssueSeverity::Warning,
                format!(
                    "Quantity {} exceeds the usual maximum of {}",
                    quantity, rules.max_quantity
                ),
            ));
        }
    }

    BusinessValidationResult::from_issues(issues)
}
