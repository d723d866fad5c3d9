use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::static_composer::StaticComposer;
use super::{Choice, ClarificationPrompt, Composer, CompositionRequest, CompositionSource, DegradeCause};
use crate::config::AiConfig;
use crate::errors::GenerationError;
use crate::kernel::intent::label::normalize;
use crate::kernel::intent::Candidate;
use crate::services::llm::{GenerationRequest, GenerationService};

pub const MAX_LABEL_CHARS: usize = 40;
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// AI-written prompts with a mandatory static fallback.
///
/// The provider call runs on its own task under a hard timeout, so a hung
/// or panicking provider costs at most `timeout_ms` and never the turn.
pub struct AiComposer {
    service: Arc<dyn GenerationService>,
    fallback: StaticComposer,
    config: AiConfig,
}

/// What we managed to read out of the model's reply.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReply {
    pub message: String,
    /// Only present when the count matched the candidates.
    pub labels: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct JsonReply {
    message: String,
    #[serde(default)]
    labels: Vec<String>,
}

impl AiComposer {
    pub fn new(service: Arc<dyn GenerationService>, fallback: StaticComposer, config: AiConfig) -> Self {
        Self { service, fallback, config }
    }

    pub fn build_prompt(&self, request: CompositionRequest<'_>) -> String {
        let mut prompt = format!(
            "The user said: \"{}\"\nThis request is ambiguous. It could mean any of these options:\n",
            request.utterance
        );
        for (i, c) in request.candidates.iter().enumerate() {
            prompt.push_str(&format!("{}. {} ({})\n", i + 1, c.display_label, c.intent_id));
        }
        prompt.push_str(
            "Write one short, friendly question asking which option they mean, and a short button \
             label for each option in the same order.\n\
             Reply with JSON only: {\"message\": \"...\", \"labels\": [\"...\"]}",
        );
        prompt
    }

    async fn generate(&self, request: CompositionRequest<'_>) -> Result<String, GenerationError> {
        let timeout_ms = self.config.timeout_ms;
        let generation = GenerationRequest {
            system_prompt: self.config.system_prompt.clone(),
            prompt: self.build_prompt(request),
            model_id: self.config.model_id.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            timeout_ms,
        };

        let service = Arc::clone(&self.service);
        let mut handle = tokio::spawn(async move { service.invoke(generation).await });

        match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(GenerationError::Aborted(join_err.to_string())),
            Err(_) => {
                handle.abort();
                Err(GenerationError::Timeout(timeout_ms))
            }
        }
    }
}

#[async_trait]
impl Composer for AiComposer {
    async fn compose(&self, request: CompositionRequest<'_>) -> ClarificationPrompt {
        let fallback = self.fallback.render(request);
        if !self.config.enabled {
            return fallback;
        }

        let reply = match self.generate(request).await {
            Ok(text) => parse_reply(&text, request.candidates.len()),
            Err(e) => Err(e),
        };

        match reply {
            Ok(reply) => {
                let labels = merge_labels(request.candidates, reply.labels.as_deref());
                info!("Clarification generated by model {}", self.config.model_id);
                ClarificationPrompt {
                    text: reply.message,
                    choices: request
                        .candidates
                        .iter()
                        .zip(labels)
                        .map(|(c, display_label)| Choice {
                            display_label,
                            intent_id: c.intent_id.clone(),
                        })
                        .collect(),
                    source: CompositionSource::Generated,
                }
            }
            Err(e) => {
                let cause = degrade_cause(&e);
                warn!("AI clarification degraded to static template ({:?}): {}", cause, e);
                ClarificationPrompt {
                    source: CompositionSource::Degraded(cause),
                    ..fallback
                }
            }
        }
    }
}

fn degrade_cause(err: &GenerationError) -> DegradeCause {
    match err {
        GenerationError::Timeout(_) => DegradeCause::Timeout,
        GenerationError::Transport(_) | GenerationError::Status(_) => DegradeCause::ProviderError,
        GenerationError::EmptyOutput | GenerationError::Malformed(_) => DegradeCause::Malformed,
        GenerationError::Aborted(_) => DegradeCause::Aborted,
    }
}

/// Read `{"message", "labels"}` JSON, or plain text with bullet lines as labels.
///
/// A JSON object is found wherever it sits in the reply (after a preamble,
/// inside a fence). Any `{` that does not parse as one is malformed.
pub fn parse_reply(raw: &str, candidate_count: usize) -> Result<GeneratedReply, GenerationError> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(GenerationError::EmptyOutput);
    }

    let (message, labels) = if text.contains('{') {
        let object = json_object(text)
            .ok_or_else(|| GenerationError::Malformed("unterminated JSON object".to_string()))?;
        let parsed: JsonReply =
            serde_json::from_str(object).map_err(|e| GenerationError::Malformed(e.to_string()))?;
        (parsed.message, parsed.labels)
    } else {
        let mut message_lines = Vec::new();
        let mut labels = Vec::new();
        for line in text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with("```"))
        {
            match strip_bullet(line) {
                Some(label) => labels.push(label.to_string()),
                None => message_lines.push(line),
            }
        }
        (message_lines.join(" "), labels)
    };

    let message = message.trim().trim_matches('"').trim().to_string();
    if message.is_empty() {
        return Err(GenerationError::EmptyOutput);
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(GenerationError::Malformed(format!(
            "message longer than {} chars",
            MAX_MESSAGE_CHARS
        )));
    }

    let labels = if labels.len() == candidate_count {
        Some(labels.into_iter().map(|l| l.trim().to_string()).collect())
    } else {
        if !labels.is_empty() {
            debug!("Ignoring {} AI labels for {} candidates", labels.len(), candidate_count);
        }
        None
    };

    Ok(GeneratedReply { message, labels })
}

/// Accept AI labels one by one; any that is unusable or collides goes back
/// to the humanized label. The result stays pairwise distinct.
pub fn merge_labels(candidates: &[Candidate], proposed: Option<&[String]>) -> Vec<String> {
    let humanized: Vec<String> = candidates.iter().map(|c| c.display_label.clone()).collect();
    let Some(proposed) = proposed.filter(|p| p.len() == candidates.len()) else {
        return humanized;
    };

    let mut accepted: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(candidates.len());

    for (i, label) in proposed.iter().enumerate() {
        let norm = normalize(label);
        let clashes_other = humanized
            .iter()
            .enumerate()
            .any(|(j, h)| j != i && normalize(h) == norm);
        let usable = !norm.is_empty()
            && label.chars().count() <= MAX_LABEL_CHARS
            && !clashes_other
            && !accepted.contains(&norm);

        if usable {
            accepted.insert(norm);
            out.push(label.clone());
        } else {
            debug!("Discarded AI label for {}", candidates[i].intent_id);
            out.push(humanized[i].clone());
        }
    }
    out
}

/// First `{` through last `}`.
fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the language tag line
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

fn strip_bullet(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}
