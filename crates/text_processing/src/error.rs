//! Text processing errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TextProcessingError>;

#[derive(Error, Debug)]
pub enum TextProcessingError {
    #[error("Pattern compilation failed for {name}: {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid vocabulary: {0}")]
    Vocabulary(String),
}
