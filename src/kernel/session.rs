//! Cross-turn memory.
//!
//! A [`PendingDisambiguation`] is the only state this engine keeps between
//! turns, and it lives entirely in the host's session attributes: a flat
//! `String -> String` map. Nothing is cached in-process.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SessionError;
use crate::kernel::compose::Choice;

pub type SessionAttributes = BTreeMap<String, String>;

pub const ATTR_ACTIVE: &str = "disambiguation_active";
pub const ATTR_CANDIDATES: &str = "disambiguation_candidates";
pub const ATTR_UTTERANCE: &str = "disambiguation_utterance";
pub const ATTR_TURNS_REMAINING: &str = "disambiguation_turns_remaining";
pub const ATTR_PROMPT: &str = "disambiguation_prompt";
pub const ATTR_ID: &str = "disambiguation_id";
pub const ATTR_DELIVERY_ID: &str = "disambiguation_delivery_id";

const ALL_ATTRS: [&str; 7] = [
    ATTR_ACTIVE,
    ATTR_CANDIDATES,
    ATTR_UTTERANCE,
    ATTR_TURNS_REMAINING,
    ATTR_PROMPT,
    ATTR_ID,
    ATTR_DELIVERY_ID,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredChoice {
    intent_id: String,
    label: String,
}

/// An open clarification question, waiting for the user's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDisambiguation {
    pub clarification_id: Uuid,
    /// Parallel to `candidate_labels`, in the order they were shown.
    pub candidate_intent_ids: Vec<String>,
    pub candidate_labels: Vec<String>,
    pub original_utterance: String,
    pub turns_remaining: u32,
    /// Re-emitted verbatim on a reprompt.
    pub prompt_text: String,
    pub last_delivery_id: Option<String>,
}

impl PendingDisambiguation {
    pub fn new(choices: &[Choice], original_utterance: &str, prompt_text: &str, turns: u32) -> Self {
        Self {
            clarification_id: Uuid::new_v4(),
            candidate_intent_ids: choices.iter().map(|c| c.intent_id.clone()).collect(),
            candidate_labels: choices.iter().map(|c| c.display_label.clone()).collect(),
            original_utterance: original_utterance.to_string(),
            turns_remaining: turns,
            prompt_text: prompt_text.to_string(),
            last_delivery_id: None,
        }
    }

    pub fn choices(&self) -> Vec<Choice> {
        self.candidate_intent_ids
            .iter()
            .zip(&self.candidate_labels)
            .map(|(id, label)| Choice {
                display_label: label.clone(),
                intent_id: id.clone(),
            })
            .collect()
    }

    /// Write into `attrs`, leaving unrelated host attributes alone.
    pub fn write_to(&self, attrs: &mut SessionAttributes) -> Result<(), SessionError> {
        let stored: Vec<StoredChoice> = self
            .candidate_intent_ids
            .iter()
            .zip(&self.candidate_labels)
            .map(|(id, label)| StoredChoice {
                intent_id: id.clone(),
                label: label.clone(),
            })
            .collect();
        let candidates = serde_json::to_string(&stored).map_err(|e| SessionError::Corrupt(e.to_string()))?;

        attrs.insert(ATTR_ACTIVE.to_string(), "true".to_string());
        attrs.insert(ATTR_CANDIDATES.to_string(), candidates);
        attrs.insert(ATTR_UTTERANCE.to_string(), self.original_utterance.clone());
        attrs.insert(ATTR_TURNS_REMAINING.to_string(), self.turns_remaining.to_string());
        attrs.insert(ATTR_PROMPT.to_string(), self.prompt_text.clone());
        attrs.insert(ATTR_ID.to_string(), self.clarification_id.to_string());
        match &self.last_delivery_id {
            Some(id) => attrs.insert(ATTR_DELIVERY_ID.to_string(), id.clone()),
            None => attrs.remove(ATTR_DELIVERY_ID),
        };
        Ok(())
    }

    /// `Ok(None)` when no clarification is open.
    pub fn read_from(attrs: &SessionAttributes) -> Result<Option<Self>, SessionError> {
        if attrs.get(ATTR_ACTIVE).map(String::as_str) != Some("true") {
            return Ok(None);
        }

        let raw = required(attrs, ATTR_CANDIDATES)?;
        let stored: Vec<StoredChoice> =
            serde_json::from_str(raw).map_err(|e| SessionError::Corrupt(format!("{}: {}", ATTR_CANDIDATES, e)))?;
        if stored.is_empty() {
            return Err(SessionError::Corrupt("no candidates stored".to_string()));
        }

        let turns_remaining = required(attrs, ATTR_TURNS_REMAINING)?
            .parse::<u32>()
            .map_err(|e| SessionError::Corrupt(format!("{}: {}", ATTR_TURNS_REMAINING, e)))?;
        let clarification_id = required(attrs, ATTR_ID)?
            .parse::<Uuid>()
            .map_err(|e| SessionError::Corrupt(format!("{}: {}", ATTR_ID, e)))?;

        Ok(Some(Self {
            clarification_id,
            candidate_intent_ids: stored.iter().map(|c| c.intent_id.clone()).collect(),
            candidate_labels: stored.into_iter().map(|c| c.label).collect(),
            original_utterance: attrs.get(ATTR_UTTERANCE).cloned().unwrap_or_default(),
            turns_remaining,
            prompt_text: required(attrs, ATTR_PROMPT)?.clone(),
            last_delivery_id: attrs.get(ATTR_DELIVERY_ID).cloned(),
        }))
    }

    pub fn clear(attrs: &mut SessionAttributes) {
        for key in ALL_ATTRS {
            attrs.remove(key);
        }
    }
}

fn required<'a>(attrs: &'a SessionAttributes, key: &str) -> Result<&'a String, SessionError> {
    attrs
        .get(key)
        .ok_or_else(|| SessionError::Corrupt(format!("missing {}", key)))
}

/// Host session persistence, keyed by session id.
pub trait SessionStore: Send + Sync {
    /// A session never seen before loads as an empty map.
    fn load(&self, session_id: &str) -> Result<SessionAttributes, SessionError>;
    fn save(&self, session_id: &str, attrs: &SessionAttributes) -> Result<(), SessionError>;
}

/// Process-local store. Enough for tests and the console driver; a real
/// deployment persists sessions outside the process.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionAttributes>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, session_id: &str) -> SessionAttributes {
        self.sessions.lock().get(session_id).cloned().unwrap_or_default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, session_id: &str) -> Result<SessionAttributes, SessionError> {
        Ok(self.snapshot(session_id))
    }

    fn save(&self, session_id: &str, attrs: &SessionAttributes) -> Result<(), SessionError> {
        self.sessions.lock().insert(session_id.to_string(), attrs.clone());
        Ok(())
    }
}
