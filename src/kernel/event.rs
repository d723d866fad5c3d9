use serde::{Deserialize, Serialize};

use super::compose::Choice;
use super::intent::Interpretation;
use super::session::SessionAttributes;

/// One inbound turn, as the host hands it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    pub locale: Option<String>,
    pub utterance: String,
    pub interpretations: Vec<Interpretation>,
    /// Value of a tapped choice element, when the channel echoes it back.
    pub echoed_choice: Option<String>,
    /// Platform delivery id; equal ids mean a redelivered turn.
    pub delivery_id: Option<String>,
}

impl TurnRequest {
    pub fn text(session_id: &str, utterance: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            locale: None,
            utterance: utterance.to_string(),
            interpretations: Vec::new(),
            echoed_choice: None,
            delivery_id: None,
        }
    }

    pub fn with_interpretations(mut self, interpretations: Vec<Interpretation>) -> Self {
        self.interpretations = interpretations;
        self
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = Some(locale.to_string());
        self
    }

    pub fn with_echoed_choice(mut self, value: &str) -> Self {
        self.echoed_choice = Some(value.to_string());
        self
    }

    pub fn with_delivery_id(mut self, id: &str) -> Self {
        self.delivery_id = Some(id.to_string());
        self
    }
}

/// An interactive choice. Label and value are both the display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceElement {
    pub label: String,
    pub value: String,
}

/// Outbound turn: text messages plus optional choice elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub messages: Vec<String>,
    pub choices: Vec<ChoiceElement>,
}

impl TurnResponse {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            choices: Vec::new(),
        }
    }

    pub fn clarification(text: &str, choices: &[Choice]) -> Self {
        Self {
            messages: vec![text.to_string()],
            choices: choices
                .iter()
                .map(|c| ChoiceElement {
                    label: c.display_label.clone(),
                    value: c.display_label.clone(),
                })
                .collect(),
        }
    }
}

/// What a dispatched intent handler gets to see.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationContext {
    pub session_id: String,
    pub locale: String,
    /// The utterance the intent is being dispatched for. After a clarification
    /// this is the original, ambiguous utterance.
    pub utterance: String,
    /// The user's answer to the clarification question, if there was one.
    pub clarification_reply: Option<String>,
    pub active_intent: Interpretation,
    pub attributes: SessionAttributes,
}
