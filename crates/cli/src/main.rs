//! Voice ledger command-line tool
//!
//! Detected transactions and extraction results are written to stdout as
//! JSON lines; logs go to stderr.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_ledger_agent::{ConversationStateMachine, ExtractionCoordinator};
use voice_ledger_config::{load_settings, MarketVocabularyConfig, Settings};
use voice_ledger_core::{InMemoryVocabulary, Transaction, TransactionSink};
use voice_ledger_text_processing::{EntityNormalizer, PatternMatcher};

/// voice-ledger - detect market sales in transcribed speech
#[derive(Parser, Debug)]
#[command(name = "voice-ledger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a JSON-lines utterance log through the state machine
    Replay {
        /// Log file, or `-` for stdin
        path: String,
    },
    /// Run one-shot extraction on each transcript
    Extract {
        /// Transcripts to extract
        #[arg(required = true)]
        texts: Vec<String>,
    },
}

/// One line of a replay log
#[derive(Debug, Deserialize)]
struct Utterance {
    text: String,
    #[serde(default)]
    speaker_id: String,
    #[serde(default)]
    is_seller: bool,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
}

/// Writes each transaction to stdout as a JSON line
struct StdoutSink;

impl TransactionSink for StdoutSink {
    fn persist(&self, transaction: &Transaction) -> voice_ledger_core::Result<()> {
        let line = serde_json::to_string(transaction)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)
            .map_err(|e| voice_ledger_core::Error::Storage(e.to_string()))
    }
}

/// Shared matcher and normalizer built from the configured vocabulary
struct Components {
    vocabulary: MarketVocabularyConfig,
    matcher: Arc<PatternMatcher>,
    normalizer: Arc<EntityNormalizer>,
}

impl Components {
    fn load(settings: &Settings) -> anyhow::Result<Self> {
        let vocabulary = MarketVocabularyConfig::load_or_default(settings.vocabulary_path.as_deref())
            .context("Failed to load market vocabulary")?;
        let matcher = PatternMatcher::with_vocabulary(&vocabulary)
            .context("Failed to compile vocabulary patterns")?;
        let normalizer = EntityNormalizer::with_config(&vocabulary, &settings.currency);
        tracing::info!(
            products = vocabulary.products.len(),
            units = vocabulary.unit_synonyms.len(),
            "Market vocabulary loaded"
        );
        Ok(Self {
            vocabulary,
            matcher: Arc::new(matcher),
            normalizer: Arc::new(normalizer),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("VOICE_LEDGER_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };

    init_tracing(&settings);
    tracing::debug!(
        environment = ?settings.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    match cli.command {
        Command::Replay { path } => replay(&settings, &path),
        Command::Extract { texts } => extract(&settings, texts).await,
    }
}

/// Feed a recorded conversation through the state machine
fn replay(settings: &Settings, path: &str) -> anyhow::Result<()> {
    let components = Components::load(settings)?;
    let machine = ConversationStateMachine::with_components(
        settings.engine.clone(),
        components.matcher,
        components.normalizer,
    )
    .with_sink(Arc::new(StdoutSink));

    let reader: Box<dyn BufRead> = if path == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path))?;
        Box::new(BufReader::new(file))
    };

    let mut processed = 0usize;
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let utterance: Utterance = match serde_json::from_str(&line) {
            Ok(utterance) => utterance,
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "Skipping malformed utterance");
                continue;
            },
        };

        let transition = machine.process_utterance(
            &utterance.text,
            &utterance.speaker_id,
            utterance.is_seller,
            utterance.timestamp,
        );
        tracing::info!(
            line = index + 1,
            from = %transition.from,
            to = %transition.to,
            confidence = transition.confidence,
            applied = transition.valid,
            "Utterance processed"
        );
        processed += 1;
    }

    if machine.force_complete().is_some() {
        tracing::info!("Closed open session at end of replay");
    }
    tracing::info!(utterances = processed, "Replay finished");
    Ok(())
}

/// One-shot extraction for each transcript
async fn extract(settings: &Settings, transcripts: Vec<String>) -> anyhow::Result<()> {
    let components = Components::load(settings)?;
    let vocabulary = Arc::new(InMemoryVocabulary::with_products(
        components.vocabulary.to_products(),
    ));
    let coordinator = Arc::new(ExtractionCoordinator::with_components(
        &settings.extraction,
        components.matcher,
        components.normalizer,
        vocabulary,
    ));

    let results = coordinator.process_batch(transcripts).await;
    let mut stdout = std::io::stdout().lock();
    for result in &results {
        writeln!(stdout, "{}", serde_json::to_string(result)?)?;
    }

    let valid = results.iter().filter(|r| r.is_valid()).count();
    tracing::info!(total = results.len(), valid, "Extraction finished");
    Ok(())
}

/// Initialize tracing; logs go to stderr so stdout stays machine-readable
fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("voice_ledger={}", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    subscriber.with(fmt_layer).init();
}
