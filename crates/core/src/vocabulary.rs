//! In-memory product vocabulary
//!
//! Default `ProductVocabulary` implementation used by the CLI and tests.
//! Production deployments back the trait with on-device storage.

use parking_lot::RwLock;

use crate::traits::{Product, ProductVocabulary};
use crate::{Error, Result};

/// Thread-safe product table guarded by a read-write lock
#[derive(Debug, Default)]
pub struct InMemoryVocabulary {
    products: RwLock<Vec<Product>>,
}

impl InMemoryVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products: RwLock::new(products),
        }
    }

    pub fn add_product(&self, product: Product) {
        self.products.write().push(product);
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }

    /// Snapshot of all products
    pub fn products(&self) -> Vec<Product> {
        self.products.read().clone()
    }
}

impl ProductVocabulary for InMemoryVocabulary {
    fn lookup_product(&self, name: &str) -> Result<Option<Product>> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.products.read().iter().find(|p| p.matches(name)).cloned())
    }

    fn increment_frequency(&self, id: &str) -> Result<()> {
        let mut products = self.products.write();
        let product = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::ProductNotFound(id.to_string()))?;
        product.frequency += 1;
        Ok(())
    }

    fn correct_product_name(&self, wrong: &str, correct: &str) -> Result<()> {
        let wrong = wrong.trim();
        let correct = correct.trim();
        if wrong.is_empty() || correct.is_empty() {
            return Err(Error::InvalidInput(
                "correction requires both names".to_string(),
            ));
        }

        let mut products = self.products.write();

        // A misheard token must not stay attached to the wrong product
        for product in products.iter_mut() {
            if !product.name.eq_ignore_ascii_case(correct) {
                product.variants.retain(|v| !v.eq_ignore_ascii_case(wrong));
            }
        }

        match products
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(correct))
        {
            Some(product) => {
                if !product.matches(wrong) {
                    product.variants.push(wrong.to_lowercase());
                }
            },
            None => {
                let id = correct.to_lowercase().replace(' ', "_");
                tracing::debug!(product = %correct, "Adding product learned from correction");
                products.push(Product::new(id, correct).with_variants(vec![wrong.to_lowercase()]));
            },
        }

        Ok(())
    }
}
