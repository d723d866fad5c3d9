use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::AiConfig;
use crate::errors::GenerationError;

/// One text-generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
}

/// External AI text generation.
///
/// Implementations should honour `timeout_ms` themselves; callers enforce it
/// again from the outside.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn invoke(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Talks to a llama-server style `/completion` endpoint.
#[derive(Clone)]
pub struct HttpGenerationService {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    prompt: String,
    stream: bool,
    n_predict: u32,
    temperature: f32,
    stop: Vec<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

impl HttpGenerationService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout) // network-level cap; the composer adds its own
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AiConfig) -> Self {
        Self::new(config.endpoint.clone(), Duration::from_millis(config.timeout_ms))
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn invoke(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let full_prompt = format!(
            "System: {}\nUser: {}\nAssistant:",
            request.system_prompt, request.prompt
        );

        let body = CompletionRequest {
            model: request.model_id,
            prompt: full_prompt,
            stream: false, // one-shot only
            n_predict: request.max_tokens,
            temperature: request.temperature,
            stop: vec!["User:".to_string(), "System:".to_string()],
        };

        let timeout_ms = request.timeout_ms;
        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .timeout(Duration::from_millis(timeout_ms))
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(e, timeout_ms))?;

        if !response.status().is_success() {
            return Err(GenerationError::Status(response.status().as_u16()));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        let text = parsed.content.trim().to_string();
        debug!("Completion returned {} chars", text.len());
        if text.is_empty() {
            return Err(GenerationError::EmptyOutput);
        }
        Ok(text)
    }
}

fn classify(err: reqwest::Error, timeout_ms: u64) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(timeout_ms)
    } else {
        GenerationError::Transport(err.to_string())
    }
}
