//! Error types shared by the ledger crates

use thiserror::Error;

/// Result alias using the core error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors raised by collaborators (vocabulary, storage)
#[derive(Error, Debug)]
pub enum Error {
    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
