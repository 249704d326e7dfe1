//! Collaborator traits
//!
//! The detection engine talks to the outside world only through these
//! interfaces. Implementations must be thread-safe (Send + Sync).

mod storage;
mod vocabulary;

pub use storage::TransactionSink;
pub use vocabulary::{Product, ProductVocabulary};
