//! Engine configuration.
//!
//! Loaded from JSON; every field has a default so a partial file (or `{}`)
//! is valid. [`DisambiguationConfig::validate`] is the single fail-fast gate:
//! nothing downstream re-checks these invariants at runtime.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ConfigError;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
pub const MIN_AI_TIMEOUT_MS: u64 = 50;
pub const MAX_AI_TIMEOUT_MS: u64 = 10_000;

const DEFAULT_SYSTEM_PROMPT: &str = "You help a customer-service assistant ask short, friendly clarifying questions. \
You never answer the user's request yourself and you never invent options.";

pub type IntentGroups = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisambiguationConfig {
    /// Top score below this means the NLU is guessing.
    pub confidence_threshold: f64,
    /// Max gap between the top two scores that still counts as a tie.
    pub similarity_threshold: f64,
    pub min_candidates: usize,
    pub max_candidates: usize,
    /// Related intents that should only ever take up one candidate slot.
    pub intent_groups: IntentGroups,
    /// Groups used only to pick clarification wording.
    pub message_groups: IntentGroups,
    /// Message text keyed by pair, group or cardinality key.
    pub message_overrides: BTreeMap<String, String>,
    /// How many turns a clarification stays open (first ask included).
    pub clarification_turns: u32,
    /// Dispatched when a clarification expires without a match.
    pub fallback_intent: String,
    pub default_locale: String,
    pub ai: AiConfig,
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            similarity_threshold: 0.15,
            min_candidates: 2,
            max_candidates: 3,
            intent_groups: BTreeMap::new(),
            message_groups: BTreeMap::new(),
            message_overrides: BTreeMap::new(),
            clarification_turns: 2,
            fallback_intent: "FallbackIntent".to_string(),
            default_locale: "en_US".to_string(),
            ai: AiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    pub timeout_ms: u64,
    /// Accepted so config files can state it; `false` is rejected.
    pub fallback_required: bool,
    pub endpoint: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model_id: String::new(),
            max_tokens: 150,
            temperature: 0.3,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout_ms: 1500,
            fallback_required: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl DisambiguationConfig {
    /// Parse and validate.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&raw)?;
        info!(
            "Loaded disambiguation config from {} (ai enabled: {})",
            path.display(),
            config.ai.enabled
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_candidates < 2 || self.max_candidates < 2 || self.min_candidates > self.max_candidates {
            return Err(ConfigError::CandidateBounds {
                min: self.min_candidates,
                max: self.max_candidates,
            });
        }

        check_unit("confidence_threshold", self.confidence_threshold)?;
        check_unit("similarity_threshold", self.similarity_threshold)?;

        if self.clarification_turns == 0 {
            return Err(ConfigError::NoClarificationTurns);
        }

        // An intent in two collapse groups would make the representative ambiguous.
        let mut owner: BTreeMap<&str, &str> = BTreeMap::new();
        for (group, members) in &self.intent_groups {
            for intent_id in members {
                if let Some(first) = owner.insert(intent_id.as_str(), group.as_str()) {
                    return Err(ConfigError::OverlappingGroups {
                        intent_id: intent_id.clone(),
                        first: first.to_string(),
                        second: group.clone(),
                    });
                }
            }
        }

        self.ai.validate()
    }

    /// The collapse group an intent belongs to, if any.
    pub fn group_of(&self, intent_id: &str) -> Option<&str> {
        self.intent_groups
            .iter()
            .find(|(_, members)| members.contains(intent_id))
            .map(|(name, _)| name.as_str())
    }
}

impl AiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fallback_required {
            return Err(ConfigError::FallbackDisabled);
        }
        if !self.enabled {
            return Ok(());
        }
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::MissingModelId);
        }
        if !(MIN_AI_TIMEOUT_MS..=MAX_AI_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::TimeoutOutOfRange {
                value: self.timeout_ms,
                min: MIN_AI_TIMEOUT_MS,
                max: MAX_AI_TIMEOUT_MS,
            });
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::AiParameter {
                name: "temperature",
                detail: format!("expected 0.0..=2.0, got {}", self.temperature),
            });
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::AiParameter {
                name: "max_tokens",
                detail: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}
