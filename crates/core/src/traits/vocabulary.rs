//! Product vocabulary collaborator

use serde::{Deserialize, Serialize};

use crate::Result;

/// Canonical product record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    /// Canonical display name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Local-language and slang variants
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    /// How often the product has been recognized
    #[serde(default)]
    pub frequency: u64,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            variants: Vec::new(),
            min_price: None,
            max_price: None,
            frequency: 0,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_variants(mut self, variants: Vec<String>) -> Self {
        self.variants = variants;
        self
    }

    pub fn with_price_range(mut self, min: f64, max: f64) -> Self {
        self.min_price = Some(min);
        self.max_price = Some(max);
        self
    }

    /// Case-insensitive match against the name and all variants
    pub fn matches(&self, name: &str) -> bool {
        let needle = name.trim();
        self.name.eq_ignore_ascii_case(needle)
            || self.variants.iter().any(|v| v.eq_ignore_ascii_case(needle))
    }

    /// Whether a price lies in the product's plausible range
    ///
    /// Products without a configured range accept any price.
    pub fn price_in_range(&self, price: f64) -> bool {
        let above_min = self.min_price.map_or(true, |min| price >= min);
        let below_max = self.max_price.map_or(true, |max| price <= max);
        above_min && below_max
    }
}

/// Read/write access to canonical product records
///
/// Backed by local storage in production; lookups are expected to be fast.
pub trait ProductVocabulary: Send + Sync {
    /// Find a product by canonical name or variant
    fn lookup_product(&self, name: &str) -> Result<Option<Product>>;

    /// Record that a product was recognized in a transcript
    fn increment_frequency(&self, id: &str) -> Result<()>;

    /// Teach the vocabulary that `wrong` should have been `correct`
    fn correct_product_name(&self, wrong: &str, correct: &str) -> Result<()>;
}
