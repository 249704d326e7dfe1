//! Market vocabulary configuration
//!
//! Loads the product table, unit synonyms and qualitative quantity words used
//! for entity normalization. A file can be supplied via
//! `Settings::vocabulary_path`; otherwise the built-in Ghanaian market
//! vocabulary below is used.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use voice_ledger_core::Product;

use crate::ConfigError;

/// Product definition with its local-language variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Twi/Ga names, plurals, common misspellings
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
}

impl ProductEntry {
    fn new(id: &str, name: &str, category: &str, variants: &[&str], price: (f64, f64)) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: Some(category.to_string()),
            variants: variants.iter().map(|v| v.to_string()).collect(),
            min_price: Some(price.0),
            max_price: Some(price.1),
        }
    }
}

/// Full market vocabulary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketVocabularyConfig {
    #[serde(default)]
    pub products: Vec<ProductEntry>,
    /// Unit word -> canonical unit ("bowls" -> "bowl")
    #[serde(default)]
    pub unit_synonyms: HashMap<String, String>,
    /// Qualitative quantity word -> multiplier ("plenty" -> 5)
    #[serde(default)]
    pub quantity_multipliers: HashMap<String, f64>,
}

impl Default for MarketVocabularyConfig {
    fn default() -> Self {
        Self::ghana_market()
    }
}

impl MarketVocabularyConfig {
    /// Load from a YAML or TOML file (chosen by extension)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?
            },
            _ => serde_yaml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!(
            products = config.products.len(),
            units = config.unit_synonyms.len(),
            "Loaded market vocabulary from {}",
            path.display()
        );
        Ok(config)
    }

    /// Load from an optional path, falling back to the built-in vocabulary
    pub fn load_or_default(path: Option<&str>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for product in &self.products {
            if product.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("products.{}.name", product.id),
                    message: "Product name cannot be blank".to_string(),
                });
            }
            if let (Some(min), Some(max)) = (product.min_price, product.max_price) {
                if min > max {
                    return Err(ConfigError::InvalidValue {
                        field: format!("products.{}.min_price", product.id),
                        message: format!("min_price {} exceeds max_price {}", min, max),
                    });
                }
            }
        }
        for (word, multiplier) in &self.quantity_multipliers {
            if *multiplier <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("quantity_multipliers.{}", word),
                    message: format!("Multiplier must be positive, got {}", multiplier),
                });
            }
        }
        Ok(())
    }

    /// Product records for the vocabulary collaborator
    pub fn to_products(&self) -> Vec<Product> {
        self.products
            .iter()
            .map(|entry| Product {
                id: entry.id.clone(),
                name: entry.name.clone(),
                category: entry.category.clone(),
                variants: entry.variants.clone(),
                min_price: entry.min_price,
                max_price: entry.max_price,
                frequency: 0,
            })
            .collect()
    }

    /// Lowercased term -> (canonical name, category), covering names and variants
    pub fn product_synonyms(&self) -> HashMap<String, (String, Option<String>)> {
        let mut map = HashMap::new();
        for entry in &self.products {
            let canonical = (entry.name.clone(), entry.category.clone());
            map.insert(entry.name.to_lowercase(), canonical.clone());
            for variant in &entry.variants {
                map.insert(variant.to_lowercase(), canonical.clone());
            }
        }
        map
    }

    /// All recognizable product terms, longest first
    pub fn product_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self.product_synonyms().into_keys().collect();
        terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        terms
    }

    /// Built-in vocabulary for Ghanaian open-air markets
    pub fn ghana_market() -> Self {
        let products = vec![
            ProductEntry::new("tilapia", "Tilapia", "Fish", &["tilapias"], (5.0, 150.0)),
            ProductEntry::new("fish", "Fish", "Fish", &["apataa", "fishes"], (2.0, 200.0)),
            ProductEntry::new("salted_fish", "Salted Fish", "Fish", &["kobi", "koobi", "momoni"], (2.0, 80.0)),
            ProductEntry::new("fried_fish", "Fried Fish", "Fish", &["kenam"], (2.0, 60.0)),
            ProductEntry::new("cassava", "Cassava", "Tubers", &["bankye", "bankyi"], (2.0, 100.0)),
            ProductEntry::new("yam", "Yam", "Tubers", &["bayere", "yams"], (5.0, 200.0)),
            ProductEntry::new("plantain", "Plantain", "Tubers", &["borode", "brodie", "plantains"], (2.0, 120.0)),
            ProductEntry::new("banana", "Banana", "Fruits", &["kwadu", "bananas"], (1.0, 50.0)),
            ProductEntry::new("orange", "Oranges", "Fruits", &["ankaa", "orange"], (0.5, 60.0)),
            ProductEntry::new("tomato", "Tomatoes", "Vegetables", &["ntoos", "ntosi", "tomato"], (1.0, 150.0)),
            ProductEntry::new("pepper", "Pepper", "Vegetables", &["mako", "peppers"], (1.0, 80.0)),
            ProductEntry::new("onion", "Onions", "Vegetables", &["gyeene", "onion"], (1.0, 120.0)),
            ProductEntry::new("okra", "Okra", "Vegetables", &["nkruma", "okro"], (1.0, 50.0)),
            ProductEntry::new("garden_egg", "Garden Eggs", "Vegetables", &["nyaadewa", "garden egg"], (1.0, 50.0)),
            ProductEntry::new("kontomire", "Cocoyam Leaves", "Vegetables", &["kontomire"], (1.0, 30.0)),
            ProductEntry::new("rice", "Rice", "Grains", &["emo"], (3.0, 500.0)),
            ProductEntry::new("maize", "Maize", "Grains", &["aburo", "corn"], (2.0, 400.0)),
            ProductEntry::new("beans", "Beans", "Grains", &["adua"], (2.0, 300.0)),
            ProductEntry::new("groundnut", "Groundnuts", "Grains", &["nkate", "groundnut", "peanuts"], (2.0, 200.0)),
            ProductEntry::new("gari", "Gari", "Grains", &["garri"], (2.0, 300.0)),
            ProductEntry::new("eggs", "Eggs", "Protein", &["kosua", "nkosua", "egg"], (1.0, 80.0)),
            ProductEntry::new("chicken", "Chicken", "Protein", &["akoko"], (20.0, 250.0)),
            ProductEntry::new("palm_oil", "Palm Oil", "Oils", &["zomi", "red oil"], (5.0, 300.0)),
            ProductEntry::new("kenkey", "Kenkey", "Prepared Food", &["dokon", "komi"], (0.5, 30.0)),
        ];

        let unit_synonyms = [
            ("bowl", "bowl"), ("bowls", "bowl"),
            ("kilo", "kg"), ("kilos", "kg"), ("kg", "kg"), ("kgs", "kg"),
            ("kilogram", "kg"), ("kilograms", "kg"),
            ("bag", "bag"), ("bags", "bag"), ("sack", "bag"), ("sacks", "bag"),
            ("basket", "basket"), ("baskets", "basket"),
            ("piece", "piece"), ("pieces", "piece"), ("pcs", "piece"),
            ("tin", "tin"), ("tins", "tin"),
            ("olonka", "olonka"), ("olonkas", "olonka"),
            ("crate", "crate"), ("crates", "crate"),
            ("bunch", "bunch"), ("bunches", "bunch"),
            ("bucket", "bucket"), ("buckets", "bucket"),
            ("tuber", "tuber"), ("tubers", "tuber"),
            ("finger", "finger"), ("fingers", "finger"),
            ("heap", "heap"), ("heaps", "heap"),
            ("cup", "cup"), ("cups", "cup"),
            ("box", "box"), ("boxes", "box"),
            ("bottle", "bottle"), ("bottles", "bottle"),
            ("gallon", "gallon"), ("gallons", "gallon"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let quantity_multipliers = [
            ("plenty", 5.0),
            ("pii", 5.0),
            ("several", 4.0),
            ("few", 3.0),
            ("couple", 2.0),
            ("pair", 2.0),
            ("dozen", 12.0),
            ("half", 0.5),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            products,
            unit_synonyms,
            quantity_multipliers,
        }
    }
}
