//! Clarification prompt composition.
//!
//! Two strategies behind one [`Composer`] seam. The static one is pure and
//! cannot fail; the AI one always ends in the static one when anything goes
//! wrong, so `compose` has no error type.

pub mod static_composer;
pub mod ai_composer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::kernel::intent::Candidate;
use crate::kernel::message::MessageKey;

pub use static_composer::StaticComposer;
pub use ai_composer::AiComposer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub display_label: String,
    pub intent_id: String,
}

/// Why the AI path handed over to the static template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradeCause {
    Timeout,
    ProviderError,
    Malformed,
    Aborted,
}

/// Which strategy actually produced a prompt. Never shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositionSource {
    Static,
    Generated,
    Degraded(DegradeCause),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationPrompt {
    pub text: String,
    pub choices: Vec<Choice>,
    pub source: CompositionSource,
}

/// Everything a composer needs for one prompt.
#[derive(Debug, Clone, Copy)]
pub struct CompositionRequest<'a> {
    pub candidates: &'a [Candidate],
    pub key: &'a MessageKey,
    pub utterance: &'a str,
    pub locale: &'a str,
}

#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose(&self, request: CompositionRequest<'_>) -> ClarificationPrompt;
}
