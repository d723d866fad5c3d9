//! Hand-back to business logic once an intent is settled.
//!
//! Handlers are registered explicitly at startup; lookup is a plain map
//! access by intent id.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::event::{ConversationContext, TurnResponse};

const UNHANDLED_TEXT: &str = "Sorry, I can't help with that right now.";

/// Consumer of a resolved intent. Called at most once per turn.
pub trait IntentDispatcher: Send + Sync {
    fn dispatch(&self, intent_id: &str, context: &ConversationContext) -> TurnResponse;
}

pub trait IntentHandler: Send + Sync {
    fn handle(&self, context: &ConversationContext) -> TurnResponse;
}

impl<F> IntentHandler for F
where
    F: Fn(&ConversationContext) -> TurnResponse + Send + Sync,
{
    fn handle(&self, context: &ConversationContext) -> TurnResponse {
        self(context)
    }
}

pub struct IntentRegistry {
    handlers: HashMap<String, Box<dyn IntentHandler>>,
    fallback_intent: String,
}

impl IntentRegistry {
    pub fn new(fallback_intent: &str) -> Self {
        Self {
            handlers: HashMap::new(),
            fallback_intent: fallback_intent.to_string(),
        }
    }

    pub fn register(&mut self, intent_id: &str, handler: impl IntentHandler + 'static) -> &mut Self {
        if self.handlers.insert(intent_id.to_string(), Box::new(handler)).is_some() {
            warn!("Handler for {} replaced", intent_id);
        }
        self
    }

    pub fn with(mut self, intent_id: &str, handler: impl IntentHandler + 'static) -> Self {
        self.register(intent_id, handler);
        self
    }

    pub fn contains(&self, intent_id: &str) -> bool {
        self.handlers.contains_key(intent_id)
    }
}

impl IntentDispatcher for IntentRegistry {
    /// Unknown intents go to the fallback handler, or a canned reply if none is registered.
    fn dispatch(&self, intent_id: &str, context: &ConversationContext) -> TurnResponse {
        if let Some(handler) = self.handlers.get(intent_id) {
            debug!("Dispatching {}", intent_id);
            return handler.handle(context);
        }
        warn!("No handler for {}, using {}", intent_id, self.fallback_intent);
        match self.handlers.get(&self.fallback_intent) {
            Some(handler) => handler.handle(context),
            None => TurnResponse::text(UNHANDLED_TEXT),
        }
    }
}
