//! Configuration management for the voice ledger
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, `config/{env}`)
//! - Environment variables (VOICE_LEDGER__ prefix, `__` separator)
//! - A market vocabulary file (products, unit synonyms, quantity words)

pub mod constants;
pub mod settings;
pub mod vocabulary;

pub use settings::{
    load_settings, CurrencyConfig, EngineConfig, ExtractionConfig, ObservabilityConfig,
    RuntimeEnvironment, Settings, ValidationConfig,
};
pub use vocabulary::{MarketVocabularyConfig, ProductEntry};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
