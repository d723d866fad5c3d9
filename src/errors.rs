//! Error types at the crate's module boundaries.
//!
//! Only [`ConfigError`] is ever returned to a caller of the engine, and only
//! at load time. The other two are absorbed inside a turn.

use thiserror::Error;

/// Problems found while loading or validating a [`crate::config::DisambiguationConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("candidate bounds invalid: min_candidates={min}, max_candidates={max} (need 2 <= min <= max)")]
    CandidateBounds { min: usize, max: usize },

    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("clarification_turns must be at least 1")]
    NoClarificationTurns,

    #[error("intent {intent_id} is listed in more than one intent group ({first}, {second})")]
    OverlappingGroups {
        intent_id: String,
        first: String,
        second: String,
    },

    #[error("ai.fallback_required cannot be disabled")]
    FallbackDisabled,

    #[error("ai.model_id is required when ai.enabled is true")]
    MissingModelId,

    #[error("ai.timeout_ms must be within [{min}, {max}], got {value}")]
    TimeoutOutOfRange { value: u64, min: u64, max: u64 },

    #[error("ai.{name} out of range: {detail}")]
    AiParameter { name: &'static str, detail: String },
}

/// Failures from an AI generation provider.
///
/// Never escapes the AI composer; every variant ends in the static fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation timed out after {0}ms")]
    Timeout(u64),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("provider returned no text")]
    EmptyOutput,

    #[error("malformed provider output: {0}")]
    Malformed(String),

    #[error("provider task aborted: {0}")]
    Aborted(String),
}

/// Failures from a [`crate::kernel::session::SessionStore`] or the pending-record codec.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session backend unavailable: {0}")]
    Backend(String),

    #[error("pending clarification record is corrupt: {0}")]
    Corrupt(String),
}
