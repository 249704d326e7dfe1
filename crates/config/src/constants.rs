//! Centralized defaults for the detection engine
//!
//! Single source of truth for thresholds and limits shared by the settings
//! defaults and by components constructed without a `Settings` value.

/// Conversation session limits
pub mod session {
    /// Idle time after which a half-finished sale is discarded
    pub const TIMEOUT_SECS: u64 = 120;

    /// Raw utterances kept on the context
    pub const UTTERANCE_WINDOW: usize = 5;

    /// Utterances composed into a transaction snippet
    pub const SNIPPET_UTTERANCES: usize = 3;

    /// Maximum snippet length in characters
    pub const SNIPPET_MAX_CHARS: usize = 200;
}

/// Confidence thresholds
pub mod confidence {
    /// Below this a transaction is flagged for review
    pub const MIN_ACCEPTANCE: f32 = 0.7;

    /// A cancellation match above this forces the `Cancelled` state
    pub const CANCELLATION: f32 = 0.6;
}

/// Extraction cache
pub mod cache {
    pub const CAPACITY: usize = 100;
    pub const TTL_SECS: u64 = 300;
}

/// Business validation limits (canonical currency units)
pub mod validation {
    pub const MIN_AMOUNT: f64 = 0.50;
    pub const MAX_AMOUNT: f64 = 1000.0;
    pub const MAX_QUANTITY: f64 = 50.0;
}

/// Canonical currency (Ghana cedi)
pub mod currency {
    pub const CODE: &str = "GHS";
    pub const MAJOR_UNIT: &str = "cedi";
    pub const MINOR_UNIT: &str = "pesewa";
    pub const MINOR_PER_MAJOR: u32 = 100;
}
