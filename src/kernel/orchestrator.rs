use std::sync::Arc;

use tracing::{debug, info, warn};

use super::compose::{AiComposer, Composer, CompositionRequest, StaticComposer};
use super::dispatch::IntentDispatcher;
use super::event::{ConversationContext, TurnRequest, TurnResponse};
use super::intent::{CandidateSelector, ConfidenceAnalyzer, Interpretation, Selection};
use super::matcher::ReplyMatcher;
use super::message::{MessageKeyResolver, MessageStore};
use super::session::{PendingDisambiguation, SessionAttributes, SessionStore};
use super::telemetry::{SessionOperation, SkipReason, TelemetryEvent, TelemetryRecorder};
use crate::config::DisambiguationConfig;
use crate::errors::ConfigError;
use crate::services::llm::GenerationService;

/// Where a session stands after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisambiguationState {
    Idle,
    AwaitingClarification,
    Resolved,
    Expired,
}

/// Result of one turn. Every branch is a normal outcome, none is an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Not ambiguous (or not worth asking): the host dispatches as usual.
    PassThrough,
    /// A new clarification question.
    Clarify(TurnResponse),
    /// The reply matched nothing; the same question again.
    Reprompt(TurnResponse),
    /// The reply picked an intent, already dispatched.
    Resolved { intent_id: String, response: TurnResponse },
    /// Out of turns; the fallback intent was dispatched.
    Expired(TurnResponse),
}

impl TurnOutcome {
    pub fn state(&self) -> DisambiguationState {
        match self {
            TurnOutcome::PassThrough => DisambiguationState::Idle,
            TurnOutcome::Clarify(_) | TurnOutcome::Reprompt(_) => DisambiguationState::AwaitingClarification,
            TurnOutcome::Resolved { .. } => DisambiguationState::Resolved,
            TurnOutcome::Expired(_) => DisambiguationState::Expired,
        }
    }

    pub fn response(&self) -> Option<&TurnResponse> {
        match self {
            TurnOutcome::PassThrough => None,
            TurnOutcome::Clarify(r) | TurnOutcome::Reprompt(r) | TurnOutcome::Expired(r) => Some(r),
            TurnOutcome::Resolved { response, .. } => Some(response),
        }
    }
}

pub struct DisambiguationOrchestrator {
    config: DisambiguationConfig,
    analyzer: ConfidenceAnalyzer,
    selector: CandidateSelector,
    key_resolver: MessageKeyResolver,
    matcher: ReplyMatcher,
    composer: Box<dyn Composer>,
    sessions: Arc<dyn SessionStore>,
    dispatcher: Arc<dyn IntentDispatcher>,
    pub telemetry: TelemetryRecorder,
}

impl DisambiguationOrchestrator {
    /// Validates `config`; this is the last point where anything may fail.
    ///
    /// The AI composer is used when `config.ai.enabled` and a generator is given.
    pub fn new(
        config: DisambiguationConfig,
        messages: Arc<dyn MessageStore>,
        sessions: Arc<dyn SessionStore>,
        dispatcher: Arc<dyn IntentDispatcher>,
        generator: Option<Arc<dyn GenerationService>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let fallback = StaticComposer::new(messages, config.message_overrides.clone());
        let composer: Box<dyn Composer> = match generator {
            Some(service) if config.ai.enabled => {
                info!("AI clarification enabled (model {})", config.ai.model_id);
                Box::new(AiComposer::new(service, fallback, config.ai.clone()))
            }
            None if config.ai.enabled => {
                warn!("AI clarification enabled but no generation service given; using templates");
                Box::new(fallback)
            }
            _ => Box::new(fallback),
        };

        Ok(Self::with_composer(config, composer, sessions, dispatcher))
    }

    /// Skips validation; callers must have validated `config`.
    pub fn with_composer(
        config: DisambiguationConfig,
        composer: Box<dyn Composer>,
        sessions: Arc<dyn SessionStore>,
        dispatcher: Arc<dyn IntentDispatcher>,
    ) -> Self {
        Self {
            config,
            analyzer: ConfidenceAnalyzer::new(),
            selector: CandidateSelector::new(),
            key_resolver: MessageKeyResolver::new(),
            matcher: ReplyMatcher::new(),
            composer,
            sessions,
            dispatcher,
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub fn config(&self) -> &DisambiguationConfig {
        &self.config
    }

    /// Run one turn.
    ///
    /// With no open clarification this may ask a question; with one open it
    /// only ever resolves, re-asks or expires it. The analyzer never runs on
    /// a turn that answers a clarification.
    pub async fn handle_turn(&mut self, request: &TurnRequest) -> TurnOutcome {
        let mut attrs = match self.sessions.load(&request.session_id) {
            Ok(attrs) => attrs,
            Err(e) => {
                // Without the host's attributes we cannot write a record back safely.
                warn!("Session load failed for {}: {}", request.session_id, e);
                self.telemetry.record(TelemetryEvent::SessionFailure { operation: SessionOperation::Load });
                self.telemetry.record(TelemetryEvent::Skipped { reason: SkipReason::SessionUnavailable });
                return TurnOutcome::PassThrough;
            }
        };

        match PendingDisambiguation::read_from(&attrs) {
            Ok(Some(pending)) => self.continue_clarification(request, pending, attrs),
            Ok(None) => self.start_clarification(request, attrs).await,
            Err(e) => {
                warn!("Dropping unreadable clarification record: {}", e);
                self.telemetry.record(TelemetryEvent::PendingDiscarded);
                PendingDisambiguation::clear(&mut attrs);
                self.persist(&request.session_id, &attrs);
                self.start_clarification(request, attrs).await
            }
        }
    }

    async fn start_clarification(&mut self, request: &TurnRequest, mut attrs: SessionAttributes) -> TurnOutcome {
        let analysis = self.analyzer.analyze(&request.interpretations, &self.config);
        self.telemetry.record(TelemetryEvent::Analysis {
            reason: analysis.reason,
            interpretations: request.interpretations.len(),
        });

        if !analysis.trigger() {
            self.telemetry.record(TelemetryEvent::Skipped { reason: SkipReason::NoTrigger });
            return TurnOutcome::PassThrough;
        }

        let candidates = match self.selector.select(&analysis.raw_candidates, &self.config) {
            Selection::Ready(candidates) => candidates,
            Selection::InsufficientCandidates { available, required } => {
                debug!("Skipping clarification: {} candidates, need {}", available, required);
                self.telemetry.record(TelemetryEvent::Skipped { reason: SkipReason::InsufficientCandidates });
                return TurnOutcome::PassThrough;
            }
        };

        let ids: Vec<&str> = candidates.iter().map(|c| c.intent_id.as_str()).collect();
        let key = self.key_resolver.resolve(&ids, &self.config);
        let locale = self.locale_for(request);

        let prompt = self
            .composer
            .compose(CompositionRequest {
                candidates: &candidates,
                key: &key,
                utterance: &request.utterance,
                locale: &locale,
            })
            .await;

        let mut pending = PendingDisambiguation::new(
            &prompt.choices,
            &request.utterance,
            &prompt.text,
            self.config.clarification_turns,
        );
        pending.last_delivery_id = request.delivery_id.clone();

        let saved = pending
            .write_to(&mut attrs)
            .and_then(|_| self.sessions.save(&request.session_id, &attrs));
        if let Err(e) = saved {
            // A question we could not remember the options for must not be asked.
            warn!("Could not persist clarification for {}: {}", request.session_id, e);
            self.telemetry.record(TelemetryEvent::SessionFailure { operation: SessionOperation::Save });
            self.telemetry.record(TelemetryEvent::Skipped { reason: SkipReason::SessionUnavailable });
            return TurnOutcome::PassThrough;
        }

        info!(
            "Asking for clarification {} ({:?}, {} options, key rule {:?}, {:?})",
            pending.clarification_id,
            analysis.reason,
            prompt.choices.len(),
            key.rule,
            prompt.source
        );
        self.telemetry.record(TelemetryEvent::PromptEmitted {
            clarification_id: pending.clarification_id,
            candidates: prompt.choices.len(),
            key_rule: key.rule,
            source: prompt.source,
        });

        TurnOutcome::Clarify(TurnResponse::clarification(&prompt.text, &prompt.choices))
    }

    fn continue_clarification(
        &mut self,
        request: &TurnRequest,
        mut pending: PendingDisambiguation,
        mut attrs: SessionAttributes,
    ) -> TurnOutcome {
        let id = pending.clarification_id;

        if request.delivery_id.is_some() && request.delivery_id == pending.last_delivery_id {
            debug!("Redelivered turn for clarification {}", id);
            self.telemetry.record(TelemetryEvent::DuplicateDelivery { clarification_id: id });
            return TurnOutcome::Reprompt(TurnResponse::clarification(&pending.prompt_text, &pending.choices()));
        }

        let matched = request
            .echoed_choice
            .as_deref()
            .and_then(|echo| self.matcher.match_reply(echo, &pending))
            .or_else(|| self.matcher.match_reply(&request.utterance, &pending));

        if let Some(hit) = matched {
            let intent_id = pending.candidate_intent_ids[hit.index].clone();
            PendingDisambiguation::clear(&mut attrs);
            self.persist(&request.session_id, &attrs);

            info!("Clarification {} resolved ({:?})", id, hit.kind);
            self.telemetry.record(TelemetryEvent::Resolved { clarification_id: id, match_kind: hit.kind });

            let context = self.context_for(request, &pending, &intent_id, attrs);
            let response = self.dispatcher.dispatch(&intent_id, &context);
            return TurnOutcome::Resolved { intent_id, response };
        }

        if pending.turns_remaining > 1 {
            pending.turns_remaining -= 1;
            pending.last_delivery_id = request.delivery_id.clone();
            match pending.write_to(&mut attrs) {
                Ok(()) => self.persist(&request.session_id, &attrs),
                Err(e) => warn!("Could not update clarification {}: {}", id, e),
            }

            debug!("No match for clarification {}, {} turns left", id, pending.turns_remaining);
            self.telemetry.record(TelemetryEvent::Reprompt {
                clarification_id: id,
                turns_remaining: pending.turns_remaining,
            });
            return TurnOutcome::Reprompt(TurnResponse::clarification(&pending.prompt_text, &pending.choices()));
        }

        PendingDisambiguation::clear(&mut attrs);
        self.persist(&request.session_id, &attrs);
        info!("Clarification {} expired", id);
        self.telemetry.record(TelemetryEvent::Expired { clarification_id: id });

        let fallback_intent = self.config.fallback_intent.clone();
        let context = self.context_for(request, &pending, &fallback_intent, attrs);
        TurnOutcome::Expired(self.dispatcher.dispatch(&fallback_intent, &context))
    }

    /// The intent is presented as if the NLU had returned it at full confidence.
    fn context_for(
        &self,
        request: &TurnRequest,
        pending: &PendingDisambiguation,
        intent_id: &str,
        attributes: SessionAttributes,
    ) -> ConversationContext {
        ConversationContext {
            session_id: request.session_id.clone(),
            locale: self.locale_for(request),
            utterance: pending.original_utterance.clone(),
            clarification_reply: Some(request.utterance.clone()),
            active_intent: Interpretation::new(intent_id, 1.0),
            attributes,
        }
    }

    fn locale_for(&self, request: &TurnRequest) -> String {
        request
            .locale
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.config.default_locale.clone())
    }

    fn persist(&mut self, session_id: &str, attrs: &SessionAttributes) {
        if let Err(e) = self.sessions.save(session_id, attrs) {
            warn!("Session save failed for {}: {}", session_id, e);
            self.telemetry.record(TelemetryEvent::SessionFailure { operation: SessionOperation::Save });
        }
    }
}
