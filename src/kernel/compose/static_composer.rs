use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Choice, ClarificationPrompt, Composer, CompositionRequest, CompositionSource};
use crate::kernel::message::catalog::{join_options, render, BUILTIN_CONJUNCTION, CONJUNCTION_KEY};
use crate::kernel::message::{MessageParams, MessageStore};

/// Template-based prompts. No I/O beyond the message store, no failure path.
#[derive(Clone)]
pub struct StaticComposer {
    store: Arc<dyn MessageStore>,
    overrides: BTreeMap<String, String>,
}

impl StaticComposer {
    pub fn new(store: Arc<dyn MessageStore>, overrides: BTreeMap<String, String>) -> Self {
        Self { store, overrides }
    }

    pub fn render(&self, request: CompositionRequest<'_>) -> ClarificationPrompt {
        let params = self.params(request);
        let text = match self.overrides.get(&request.key.key) {
            Some(template) => render(template, &params),
            None => self.store.resolve(&request.key.key, request.locale, &params),
        };

        ClarificationPrompt {
            text,
            choices: choices_for(request),
            source: CompositionSource::Static,
        }
    }

    fn params(&self, request: CompositionRequest<'_>) -> MessageParams {
        let labels: Vec<&str> = request
            .candidates
            .iter()
            .map(|c| c.display_label.as_str())
            .collect();
        let conjunction = self
            .store
            .lookup(CONJUNCTION_KEY, request.locale)
            .unwrap_or_else(|| BUILTIN_CONJUNCTION.to_string());

        let mut params = MessageParams::new();
        params.insert("options".to_string(), join_options(&labels, &conjunction));
        params.insert("count".to_string(), labels.len().to_string());
        params.insert("utterance".to_string(), request.utterance.to_string());
        for (i, label) in labels.iter().enumerate() {
            params.insert(format!("option_{}", i + 1), label.to_string());
        }
        params
    }
}

#[async_trait]
impl Composer for StaticComposer {
    async fn compose(&self, request: CompositionRequest<'_>) -> ClarificationPrompt {
        self.render(request)
    }
}

pub(crate) fn choices_for(request: CompositionRequest<'_>) -> Vec<Choice> {
    request
        .candidates
        .iter()
        .map(|c| Choice {
            display_label: c.display_label.clone(),
            intent_id: c.intent_id.clone(),
        })
        .collect()
}
