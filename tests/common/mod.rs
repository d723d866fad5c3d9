#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use clarify::errors::{GenerationError, SessionError};
use clarify::kernel::dispatch::IntentDispatcher;
use clarify::kernel::event::{ConversationContext, TurnRequest, TurnResponse};
use clarify::kernel::intent::Interpretation;
use clarify::kernel::message::MessageCatalog;
use clarify::kernel::session::{InMemorySessionStore, SessionAttributes, SessionStore};
use clarify::services::llm::{GenerationRequest, GenerationService};
use clarify::{DisambiguationConfig, DisambiguationOrchestrator};

pub const SESSION: &str = "session-1";

pub fn interp(intent_id: &str, confidence: f64) -> Interpretation {
    Interpretation::new(intent_id, confidence)
}

pub fn ambiguous_flight_turn() -> TurnRequest {
    TurnRequest::text(SESSION, "I need help with my flight")
        .with_interpretations(vec![interp("BookFlight", 0.4), interp("ChangeFlight", 0.35)])
}

pub fn reply(text: &str) -> TurnRequest {
    TurnRequest::text(SESSION, text)
}

/// Records every dispatch and answers with "handled <intent>".
#[derive(Default)]
pub struct RecordingDispatcher {
    pub calls: Mutex<Vec<(String, ConversationContext)>>,
}

impl RecordingDispatcher {
    pub fn intents(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(id, _)| id.clone()).collect()
    }
}

impl IntentDispatcher for RecordingDispatcher {
    fn dispatch(&self, intent_id: &str, context: &ConversationContext) -> TurnResponse {
        self.calls.lock().push((intent_id.to_string(), context.clone()));
        TurnResponse::text(format!("handled {}", intent_id))
    }
}

#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Fail(GenerationError),
    Hang(Duration),
    Panic,
}

/// A generation service that does whatever it is told.
pub struct ScriptedGenerator {
    script: Script,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn invoke(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request);
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail(e) => Err(e.clone()),
            Script::Hang(d) => {
                tokio::time::sleep(*d).await;
                Ok("too late".to_string())
            }
            Script::Panic => panic!("provider blew up"),
        }
    }
}

/// Store whose load and/or save always fail.
pub struct BrokenSessionStore {
    pub fail_load: bool,
    pub fail_save: bool,
    pub inner: InMemorySessionStore,
}

impl SessionStore for BrokenSessionStore {
    fn load(&self, session_id: &str) -> Result<SessionAttributes, SessionError> {
        if self.fail_load {
            return Err(SessionError::Backend("load refused".to_string()));
        }
        self.inner.load(session_id)
    }

    fn save(&self, session_id: &str, attrs: &SessionAttributes) -> Result<(), SessionError> {
        if self.fail_save {
            return Err(SessionError::Backend("save refused".to_string()));
        }
        self.inner.save(session_id, attrs)
    }
}

pub struct Harness {
    pub orchestrator: DisambiguationOrchestrator,
    pub sessions: Arc<InMemorySessionStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

pub fn harness(config: DisambiguationConfig) -> Harness {
    harness_with(config, Arc::new(InMemorySessionStore::new()), None)
}

pub fn harness_with(
    config: DisambiguationConfig,
    sessions: Arc<InMemorySessionStore>,
    generator: Option<Arc<dyn GenerationService>>,
) -> Harness {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let orchestrator = DisambiguationOrchestrator::new(
        config,
        Arc::new(MessageCatalog::new("en_US")),
        sessions.clone(),
        dispatcher.clone(),
        generator,
    )
    .expect("valid config");
    Harness {
        orchestrator,
        sessions,
        dispatcher,
    }
}
