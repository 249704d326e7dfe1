//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{cache, confidence, currency, session, validation};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Conversation state machine tuning
    #[serde(default)]
    pub engine: EngineConfig,

    /// Transcript extraction, caching and validation
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Canonical currency
    #[serde(default)]
    pub currency: CurrencyConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Optional market vocabulary file (YAML); built-in vocabulary otherwise
    #[serde(default)]
    pub vocabulary_path: Option<String>,
}

/// Conversation state machine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Idle seconds before an unfinished sale is discarded
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Transactions below this confidence are flagged for review
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Cancellation score that forces the `Cancelled` state
    #[serde(default = "default_cancellation_threshold")]
    pub cancellation_threshold: f32,

    /// Number of raw utterances kept on the context
    #[serde(default = "default_utterance_window")]
    pub utterance_window: usize,

    /// Utterances used for the transaction snippet
    #[serde(default = "default_snippet_utterances")]
    pub snippet_utterances: usize,

    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,
}

fn default_session_timeout_secs() -> u64 {
    session::TIMEOUT_SECS
}

fn default_min_confidence() -> f32 {
    confidence::MIN_ACCEPTANCE
}

fn default_cancellation_threshold() -> f32 {
    confidence::CANCELLATION
}

fn default_utterance_window() -> usize {
    session::UTTERANCE_WINDOW
}

fn default_snippet_utterances() -> usize {
    session::SNIPPET_UTTERANCES
}

fn default_snippet_max_chars() -> usize {
    session::SNIPPET_MAX_CHARS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout_secs(),
            min_confidence: default_min_confidence(),
            cancellation_threshold: default_cancellation_threshold(),
            utterance_window: default_utterance_window(),
            snippet_utterances: default_snippet_utterances(),
            snippet_max_chars: default_snippet_max_chars(),
        }
    }
}

impl EngineConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

/// Extraction coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Maximum cached results before the oldest is evicted
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_cache_capacity() -> usize {
    cache::CAPACITY
}

fn default_cache_ttl_secs() -> u64 {
    cache::TTL_SECS
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
            validation: ValidationConfig::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Business validation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_amount")]
    pub min_amount: f64,

    #[serde(default = "default_max_amount")]
    pub max_amount: f64,

    #[serde(default = "default_max_quantity")]
    pub max_quantity: f64,
}

fn default_min_amount() -> f64 {
    validation::MIN_AMOUNT
}

fn default_max_amount() -> f64 {
    validation::MAX_AMOUNT
}

fn default_max_quantity() -> f64 {
    validation::MAX_QUANTITY
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            max_quantity: default_max_quantity(),
        }
    }
}

/// Canonical currency configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    #[serde(default = "default_currency_code")]
    pub code: String,

    #[serde(default = "default_major_unit")]
    pub major_unit: String,

    #[serde(default = "default_minor_unit")]
    pub minor_unit: String,

    /// Divisor from minor to major unit
    #[serde(default = "default_minor_per_major")]
    pub minor_per_major: u32,
}

fn default_currency_code() -> String {
    currency::CODE.to_string()
}

fn default_major_unit() -> String {
    currency::MAJOR_UNIT.to_string()
}

fn default_minor_unit() -> String {
    currency::MINOR_UNIT.to_string()
}

fn default_minor_per_major() -> u32 {
    currency::MINOR_PER_MAJOR
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            code: default_currency_code(),
            major_unit: default_major_unit(),
            minor_unit: default_minor_unit(),
            minor_per_major: default_minor_per_major(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_engine()?;
        self.validate_extraction()?;
        self.validate_currency()?;
        Ok(())
    }

    fn validate_engine(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;

        if engine.session_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.session_timeout_secs".to_string(),
                message: "Must be at least 1 second".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&engine.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "engine.min_confidence".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", engine.min_confidence),
            });
        }

        if !(0.0..=1.0).contains(&engine.cancellation_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "engine.cancellation_threshold".to_string(),
                message: format!(
                    "Must be between 0.0 and 1.0, got {}",
                    engine.cancellation_threshold
                ),
            });
        }

        if engine.utterance_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.utterance_window".to_string(),
                message: "Must keep at least one utterance".to_string(),
            });
        }

        if engine.snippet_utterances > engine.utterance_window {
            tracing::warn!(
                "engine.snippet_utterances ({}) exceeds utterance_window ({}), \
                 snippets will be limited by the window",
                engine.snippet_utterances,
                engine.utterance_window
            );
        }

        Ok(())
    }

    fn validate_extraction(&self) -> Result<(), ConfigError> {
        let extraction = &self.extraction;

        if extraction.cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "extraction.cache_capacity".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        let limits = &extraction.validation;
        if limits.min_amount < 0.0 || limits.min_amount >= limits.max_amount {
            return Err(ConfigError::InvalidValue {
                field: "extraction.validation.min_amount".to_string(),
                message: format!(
                    "Must be non-negative and below max_amount ({}), got {}",
                    limits.max_amount, limits.min_amount
                ),
            });
        }

        if limits.max_quantity <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "extraction.validation.max_quantity".to_string(),
                message: format!("Must be positive, got {}", limits.max_quantity),
            });
        }

        Ok(())
    }

    fn validate_currency(&self) -> Result<(), ConfigError> {
        if self.currency.minor_per_major == 0 {
            return Err(ConfigError::InvalidValue {
                field: "currency.minor_per_major".to_string(),
                message: "Divisor must be positive".to_string(),
            });
        }

        if self.currency.code.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "currency.code".to_string(),
                message: "Currency code cannot be blank".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority: env vars > config/{env} > config/default > built-in defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env)
}

/// Load settings from a custom config directory
pub fn load_settings_from(dir: &str, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name(&format!("{}/default", dir)).required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("{}/{}", dir, env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_LEDGER")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
