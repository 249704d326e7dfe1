//! Transcript extraction coordinator
//!
//! One-shot pipeline for a single transcript:
//! cache lookup -> pattern extraction -> normalization -> business validation
//! -> transaction data -> cache write -> vocabulary usage update.
//!
//! Used for manual entry and batch replays where there is no conversation to
//! follow. Failures inside the pipeline come back as a failed
//! [`ProcessingResult`], never as an error.

mod cache;
mod validation;

pub use cache::{CacheStats, ExtractionCache};
pub use validation::{
    validate, BusinessIssue, BusinessValidationResult, IssueSeverity, RecommendedAction,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{AgentError, Result};
use voice_ledger_config::{ExtractionConfig, ValidationConfig};
use voice_ledger_core::{clamp_confidence, ProductVocabulary, TransactionData};
use voice_ledger_text_processing::{
    EntityNormalizer, ExtractedEntities, NormalizedEntityResult, NormalizedProduct, PatternMatcher,
};

/// Confidence for a product resolved through the vocabulary collaborator
const LEARNED_PRODUCT_CONFIDENCE: f32 = 0.9;

/// Outcome of processing one transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Raw entities as spoken
    pub raw_entities: ExtractedEntities,
    pub entities: NormalizedEntityResult,
    pub validation: BusinessValidationResult,
    pub transaction_data: Option<TransactionData>,
    pub processing_time: Duration,
    pub from_cache: bool,
    /// Overall confidence (0.0 - 1.0)
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingResult {
    /// Result for a transcript whose processing failed
    pub fn failed(
        transcript: &str,
        speaker_id: Option<&str>,
        timestamp: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        let error = error.into();
        Self {
            transcript: transcript.to_string(),
            speaker_id: speaker_id.map(str::to_string),
            timestamp,
            raw_entities: ExtractedEntities::default(),
            entities: NormalizedEntityResult::default(),
            validation: BusinessValidationResult::failed("PROCESSING_FAILED", error.clone()),
            transaction_data: None,
            processing_time: Duration::ZERO,
            from_cache: false,
            confidence: 0.0,
            error: Some(error),
        }
    }

    /// Transaction data present and no blocking issue
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.validation.is_valid && self.transaction_data.is_some()
    }
}

/// Kind of user correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionType {
    Product,
    Amount,
    Quantity,
}

/// Stateless extraction pipeline with a shared result cache
pub struct ExtractionCoordinator {
    matcher: Arc<PatternMatcher>,
    normalizer: Arc<EntityNormalizer>,
    vocabulary: Arc<dyn ProductVocabulary>,
    cache: ExtractionCache<ProcessingResult>,
    rules: ValidationConfig,
}

impl ExtractionCoordinator {
    /// Create a coordinator for the built-in market vocabulary
    pub fn new(config: &ExtractionConfig, vocabulary: Arc<dyn ProductVocabulary>) -> Self {
        Self::with_components(
            config,
            Arc::new(PatternMatcher::new()),
            Arc::new(EntityNormalizer::new()),
            vocabulary,
        )
    }

    pub fn with_components(
        config: &ExtractionConfig,
        matcher: Arc<PatternMatcher>,
        normalizer: Arc<EntityNormalizer>,
        vocabulary: Arc<dyn ProductVocabulary>,
    ) -> Self {
        Self {
            matcher,
            normalizer,
            vocabulary,
            cache: ExtractionCache::new(config.cache_capacity, config.cache_ttl()),
            rules: config.validation.clone(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Process one transcript
    pub fn process_transcript(
        &self,
        transcript: &str,
        speaker_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> ProcessingResult {
        let started = Instant::now();

        if let Some(mut cached) = self.cache.get(transcript) {
            tracing::debug!(transcript = %transcript, "Extraction cache hit");
            cached.transcript = transcript.to_string();
            cached.speaker_id = speaker_id.map(str::to_string);
            cached.timestamp = timestamp;
            cached.from_cache = true;
            cached.processing_time = started.elapsed();
            return cached;
        }

        match self.try_process(transcript, speaker_id, timestamp) {
            Ok((mut result, product_id)) => {
                result.processing_time = started.elapsed();
                self.cache.insert(transcript, result.clone());
                if let Some(id) = product_id {
                    if let Err(e) = self.vocabulary.increment_frequency(&id) {
                        tracing::warn!(product_id = %id, error = %e, "Failed to update product frequency");
                    }
                }
                tracing::debug!(
                    confidence = result.confidence,
                    has_transaction = result.transaction_data.is_some(),
                    elapsed_us = result.processing_time.as_micros() as u64,
                    "Transcript processed"
                );
                result
            },
            Err(e) => {
                tracing::warn!(transcript = %transcript, error = %e, "Transcript processing failed");
                let mut result = ProcessingResult::failed(transcript, speaker_id, timestamp, e.to_string());
                result.processing_time = started.elapsed();
                result
            },
        }
    }

    /// Process transcripts concurrently; results keep input order
    pub async fn process_batch(self: &Arc<Self>, transcripts: Vec<String>) -> Vec<ProcessingResult> {
        let timestamp = Utc::now();
        let tasks = transcripts.into_iter().map(|transcript| {
            let coordinator = Arc::clone(self);
            async move {
                let text = transcript.clone();
                tokio::task::spawn_blocking(move || {
                    coordinator.process_transcript(&text, None, timestamp)
                })
                .await
                .unwrap_or_else(|e| {
                    ProcessingResult::failed(
                        &transcript,
                        None,
                        timestamp,
                        AgentError::Task(e.to_string()).to_string(),
                    )
                })
            }
        });
        futures::future::join_all(tasks).await
    }

    /// Check sale data against the vocabulary and plausibility rules
    pub fn validate_transaction(&self, data: &TransactionData) -> BusinessValidationResult {
        match self.vocabulary.lookup_product(&data.product) {
            Ok(product) => validate(data, product.as_ref(), &self.rules),
            Err(e) => {
                tracing::warn!(product = %data.product, error = %e, "Vocabulary lookup failed");
                validate(data, None, &self.rules)
            },
        }
    }

    /// Apply a user correction
    ///
    /// Always drops the cached result for `original`. Product corrections are
    /// forwarded to the vocabulary so the misheard token maps to `corrected`
    /// from now on. Failures are logged; callers may ignore the result.
    pub fn learn_from_correction(
        &self,
        original: &str,
        corrected: &str,
        kind: CorrectionType,
    ) -> Result<()> {
        let result = self.apply_correction(original, corrected, kind);
        if let Err(ref e) = result {
            tracing::warn!(?kind, original = %original, corrected = %corrected, error = %e, "Correction not learned");
        }
        result
    }

    fn apply_correction(&self, original: &str, corrected: &str, kind: CorrectionType) -> Result<()> {
        self.cache.invalidate(original);

        match kind {
            CorrectionType::Product => {
                let corrected = corrected.trim();
                if corrected.is_empty() {
                    return Err(AgentError::InvalidCorrection(
                        "corrected product name is empty".to_string(),
                    ));
                }
                let wrong = self
                    .matcher
                    .extract_product(original)
                    .or_else(|| {
                        let token = original.trim();
                        (!token.is_empty() && token.split_whitespace().count() <= 3)
                            .then(|| token.to_lowercase())
                    })
                    .ok_or_else(|| {
                        AgentError::InvalidCorrection(format!("no product found in '{}'", original))
                    })?;
                self.vocabulary.correct_product_name(&wrong, corrected)?;
                tracing::info!(wrong = %wrong, corrected = %corrected, "Learned product correction");
            },
            CorrectionType::Amount | CorrectionType::Quantity => {
                tracing::debug!(?kind, corrected = %corrected, "Correction recorded");
            },
        }
        Ok(())
    }

    fn try_process(
        &self,
        transcript: &str,
        speaker_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<(ProcessingResult, Option<String>)> {
        let raw_entities = self.matcher.extract_entities(transcript);
        let mut entities = self.normalizer.normalize_entities(&raw_entities);

        // Corrections move spoken tokens between vocabulary products; the
        // normalizer's static synonym table never sees them, so the spoken
        // token is resolved against the vocabulary first
        let mut product_record = None;
        if let Some(product) = entities.product.clone().filter(|p| p.error.is_none()) {
            product_record = self.vocabulary.lookup_product(&product.original)?;
            if product_record.is_none() && product.was_normalized {
                product_record = self.vocabulary.lookup_product(&product.name)?;
            }
            if let Some(ref record) = product_record {
                if !record.name.eq_ignore_ascii_case(&product.name) {
                    entities.replace_product(NormalizedProduct {
                        name: record.name.clone(),
                        category: record.category.clone(),
                        original: product.original.clone(),
                        confidence: LEARNED_PRODUCT_CONFIDENCE,
                        was_normalized: true,
                        error: None,
                    });
                }
            }
        }

        let transaction_data = self.normalizer.create_transaction_data(&entities);
        let candidate = transaction_data
            .clone()
            .unwrap_or_else(|| partial_transaction_data(&entities, self.normalizer.currency_code()));
        let validation = validate(&candidate, product_record.as_ref(), &self.rules);

        let result = ProcessingResult {
            transcript: transcript.to_string(),
            speaker_id: speaker_id.map(str::to_string),
            timestamp,
            raw_entities,
            confidence: clamp_confidence(entities.overall_confidence),
            entities,
            validation,
            transaction_data,
            processing_time: Duration::ZERO,
            from_cache: false,
            error: None,
        };
        Ok((result, product_record.map(|p| p.id)))
    }
}

/// Best-effort record for validating an incomplete extraction
fn partial_transaction_data(entities: &NormalizedEntityResult, currency: &str) -> TransactionData {
    TransactionData {
        amount: entities
            .amount
            .as_ref()
            .filter(|a| a.error.is_none())
            .map_or(0.0, |a| a.value),
        currency: currency.to_string(),
        product: entities
            .product
            .as_ref()
            .filter(|p| p.is_valid())
            .map(|p| p.name.clone())
            .unwrap_or_default(),
        category: None,
        quantity: entities
            .quantity
            .as_ref()
            .filter(|q| q.is_valid())
            .map(|q| q.value),
        unit: None,
        confidence: entities.overall_confidence,
        normalizations: entities.normalizations.clone(),
    }
}
