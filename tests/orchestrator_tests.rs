mod common;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use clarify::kernel::dispatch::{IntentDispatcher, IntentRegistry};
use clarify::kernel::event::ConversationContext;
use clarify::kernel::message::MessageCatalog;
use clarify::kernel::session::{
    InMemorySessionStore, PendingDisambiguation, SessionAttributes, SessionStore, ATTR_ACTIVE, ATTR_CANDIDATES,
};
use clarify::kernel::telemetry::{SkipReason, TelemetryEvent};
use clarify::services::llm::GenerationService;
use clarify::{AiConfig, DisambiguationConfig, DisambiguationOrchestrator, DisambiguationState, TurnOutcome, TurnResponse};

use common::*;

const STATIC_TEXT: &str = "I can help you with two things: Book Flight or Change Flight. Which would you like to do?";

fn pending_in(sessions: &InMemorySessionStore) -> Option<PendingDisambiguation> {
    PendingDisambiguation::read_from(&sessions.snapshot(SESSION)).unwrap()
}

fn labels(outcome: &TurnOutcome) -> Vec<String> {
    outcome
        .response()
        .map(|r| r.choices.iter().map(|c| c.label.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_confident_turn_passes_through() {
    let mut h = harness(DisambiguationConfig::default());
    let request = reply("book a flight to Denver")
        .with_interpretations(vec![interp("BookFlight", 0.75), interp("ChangeFlight", 0.15)]);

    let outcome = h.orchestrator.handle_turn(&request).await;

    assert_eq!(outcome, TurnOutcome::PassThrough);
    assert_eq!(outcome.state(), DisambiguationState::Idle);
    assert!(pending_in(&h.sessions).is_none());
    assert!(h.dispatcher.intents().is_empty());
    assert_eq!(
        h.orchestrator.telemetry.last(),
        Some(&TelemetryEvent::Skipped { reason: SkipReason::NoTrigger })
    );
}

#[tokio::test]
async fn test_clarify_then_resolve_by_label() {
    // Scenario C
    let mut h = harness(DisambiguationConfig::default());

    let first = h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    assert_eq!(first.state(), DisambiguationState::AwaitingClarification);
    assert_eq!(first.response().unwrap().messages, vec![STATIC_TEXT.to_string()]);
    assert_eq!(labels(&first), vec!["Book Flight", "Change Flight"]);

    let pending = pending_in(&h.sessions).expect("pending record saved");
    assert_eq!(pending.candidate_intent_ids, vec!["BookFlight", "ChangeFlight"]);
    assert_eq!(pending.turns_remaining, 2);

    let second = h.orchestrator.handle_turn(&reply("change flight")).await;
    assert_eq!(
        second,
        TurnOutcome::Resolved {
            intent_id: "ChangeFlight".to_string(),
            response: TurnResponse::text("handled ChangeFlight"),
        }
    );
    assert!(pending_in(&h.sessions).is_none());
    assert!(!h.sessions.snapshot(SESSION).contains_key(ATTR_ACTIVE));

    let calls = h.dispatcher.calls.lock();
    assert_eq!(calls.len(), 1);
    let (intent, context) = &calls[0];
    assert_eq!(intent, "ChangeFlight");
    assert_eq!(context.active_intent.confidence, 1.0);
    assert_eq!(context.utterance, "I need help with my flight");
    assert_eq!(context.clarification_reply.as_deref(), Some("change flight"));
}

#[tokio::test]
async fn test_unmatched_reply_reprompts_with_same_prompt() {
    let mut h = harness(DisambiguationConfig::default());
    let first = h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;

    let second = h.orchestrator.handle_turn(&reply("pizza")).await;
    assert!(matches!(second, TurnOutcome::Reprompt(_)));
    assert_eq!(second.response(), first.response());
    assert_eq!(pending_in(&h.sessions).unwrap().turns_remaining, 1);
    assert!(h.dispatcher.intents().is_empty());
}

#[tokio::test]
async fn test_open_clarification_ignores_new_interpretations() {
    let mut h = harness(DisambiguationConfig::default());
    h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;

    let confident = reply("hello there").with_interpretations(vec![interp("Greeting", 0.99)]);
    let outcome = h.orchestrator.handle_turn(&confident).await;
    assert!(matches!(outcome, TurnOutcome::Reprompt(_)));
}

#[tokio::test]
async fn test_last_turn_without_match_expires() {
    // Scenario D
    let config = DisambiguationConfig {
        clarification_turns: 1,
        ..Default::default()
    };
    let mut h = harness(config);
    h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;

    let outcome = h.orchestrator.handle_turn(&reply("pizza")).await;
    assert_eq!(outcome, TurnOutcome::Expired(TurnResponse::text("handled FallbackIntent")));
    assert_eq!(outcome.state(), DisambiguationState::Expired);
    assert!(pending_in(&h.sessions).is_none());
    assert_eq!(h.dispatcher.intents(), vec!["FallbackIntent"]);
}

#[tokio::test]
async fn test_two_misses_expire_with_default_turns() {
    let mut h = harness(DisambiguationConfig::default());
    h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    h.orchestrator.handle_turn(&reply("pizza")).await;

    let outcome = h.orchestrator.handle_turn(&reply("still pizza")).await;
    assert_eq!(outcome.state(), DisambiguationState::Expired);

    // the session is idle again, so the next ambiguous turn asks afresh
    let again = h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    assert_eq!(again.state(), DisambiguationState::AwaitingClarification);
}

#[tokio::test]
async fn test_redelivered_turn_does_not_spend_a_turn() {
    let mut h = harness(DisambiguationConfig::default());
    h.orchestrator
        .handle_turn(&ambiguous_flight_turn().with_delivery_id("d1"))
        .await;

    let miss = reply("pizza").with_delivery_id("d2");
    assert!(matches!(h.orchestrator.handle_turn(&miss).await, TurnOutcome::Reprompt(_)));
    assert!(matches!(h.orchestrator.handle_turn(&miss).await, TurnOutcome::Reprompt(_)));
    assert_eq!(pending_in(&h.sessions).unwrap().turns_remaining, 1);

    let outcome = h
        .orchestrator
        .handle_turn(&reply("pizza").with_delivery_id("d3"))
        .await;
    assert_eq!(outcome.state(), DisambiguationState::Expired);
    assert_eq!(h.orchestrator.telemetry.snapshot().outcome_stats.duplicate_deliveries, 1);
}

#[tokio::test]
async fn test_echoed_choice_and_ordinal_resolve() {
    let mut h = harness(DisambiguationConfig::default());
    h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    let tapped = reply("").with_echoed_choice("Change Flight");
    let outcome = h.orchestrator.handle_turn(&tapped).await;
    assert!(matches!(outcome, TurnOutcome::Resolved { ref intent_id, .. } if intent_id == "ChangeFlight"));

    h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    let outcome = h.orchestrator.handle_turn(&reply("1")).await;
    assert!(matches!(outcome, TurnOutcome::Resolved { ref intent_id, .. } if intent_id == "BookFlight"));
}

#[tokio::test]
async fn test_grouped_candidates_below_minimum_pass_through() {
    let members: BTreeSet<String> = ["BookFlight", "ChangeFlight"].iter().map(|s| s.to_string()).collect();
    let config = DisambiguationConfig {
        intent_groups: BTreeMap::from([("booking".to_string(), members)]),
        ..Default::default()
    };
    let mut h = harness(config);

    let outcome = h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    assert_eq!(outcome, TurnOutcome::PassThrough);
    assert!(h.sessions.snapshot(SESSION).is_empty());
    assert_eq!(h.orchestrator.telemetry.snapshot().analysis_stats.insufficient_candidates, 1);
}

#[tokio::test]
async fn test_host_attributes_are_preserved() {
    let sessions = Arc::new(InMemorySessionStore::new());
    sessions
        .save(SESSION, &SessionAttributes::from([("customer_tier".to_string(), "gold".to_string())]))
        .unwrap();
    let mut h = harness_with(DisambiguationConfig::default(), sessions, None);

    h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    assert_eq!(h.sessions.snapshot(SESSION)["customer_tier"], "gold");

    h.orchestrator.handle_turn(&reply("book flight")).await;
    assert_eq!(
        h.sessions.snapshot(SESSION),
        SessionAttributes::from([("customer_tier".to_string(), "gold".to_string())])
    );
    let calls = h.dispatcher.calls.lock();
    assert_eq!(calls[0].1.attributes["customer_tier"], "gold");
}

#[tokio::test]
async fn test_clarification_survives_process_restart() {
    let sessions = Arc::new(InMemorySessionStore::new());
    {
        let mut before = harness_with(DisambiguationConfig::default(), sessions.clone(), None);
        before.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    }

    let mut after = harness_with(DisambiguationConfig::default(), sessions, None);
    let outcome = after.orchestrator.handle_turn(&reply("change flight")).await;
    assert_eq!(outcome.state(), DisambiguationState::Resolved);
    assert_eq!(after.dispatcher.intents(), vec!["ChangeFlight"]);
}

#[tokio::test]
async fn test_corrupt_record_is_dropped() {
    let sessions = Arc::new(InMemorySessionStore::new());
    sessions
        .save(
            SESSION,
            &SessionAttributes::from([
                (ATTR_ACTIVE.to_string(), "true".to_string()),
                (ATTR_CANDIDATES.to_string(), "not json".to_string()),
            ]),
        )
        .unwrap();
    let mut h = harness_with(DisambiguationConfig::default(), sessions, None);

    let outcome = h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    assert_eq!(outcome.state(), DisambiguationState::AwaitingClarification);
    assert!(h.orchestrator.telemetry.events().any(|e| *e == TelemetryEvent::PendingDiscarded));
}

#[tokio::test]
async fn test_session_failures_pass_through() {
    for (fail_load, fail_save) in [(true, false), (false, true)] {
        let store = Arc::new(BrokenSessionStore {
            fail_load,
            fail_save,
            inner: InMemorySessionStore::new(),
        });
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mut orchestrator = DisambiguationOrchestrator::new(
            DisambiguationConfig::default(),
            Arc::new(MessageCatalog::new("en_US")),
            store.clone(),
            dispatcher.clone(),
            None,
        )
        .unwrap();

        let outcome = orchestrator.handle_turn(&ambiguous_flight_turn()).await;
        assert_eq!(outcome, TurnOutcome::PassThrough);
        assert!(store.inner.snapshot(SESSION).is_empty());
        assert_eq!(orchestrator.telemetry.snapshot().outcome_stats.session_failures, 1);
    }
}

#[tokio::test]
async fn test_ai_timeout_still_clarifies_with_template() {
    let config = DisambiguationConfig {
        ai: AiConfig {
            enabled: true,
            model_id: "test-model".to_string(),
            timeout_ms: 50,
            ..Default::default()
        },
        ..Default::default()
    };
    let generator: Arc<dyn GenerationService> = Arc::new(ScriptedGenerator::new(Script::Hang(Duration::from_secs(5))));
    let mut h = harness_with(config, Arc::new(InMemorySessionStore::new()), Some(generator));

    let outcome = h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    assert_eq!(outcome.response().unwrap().messages, vec![STATIC_TEXT.to_string()]);

    let stats = h.orchestrator.telemetry.snapshot().prompt_stats;
    assert_eq!(stats.emitted, 1);
    assert_eq!(stats.degraded_by_timeout, 1);
}

#[tokio::test]
async fn test_generated_prompt_is_reused_on_reprompt() {
    let config = DisambiguationConfig {
        ai: AiConfig {
            enabled: true,
            model_id: "test-model".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    let raw = r#"{"message": "New trip or a change?", "labels": ["New trip", "Change my trip"]}"#;
    let scripted = Arc::new(ScriptedGenerator::new(Script::Reply(raw.to_string())));
    let generator: Arc<dyn GenerationService> = scripted.clone();
    let mut h = harness_with(config, Arc::new(InMemorySessionStore::new()), Some(generator));

    let first = h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    assert_eq!(labels(&first), vec!["New trip", "Change my trip"]);

    let second = h.orchestrator.handle_turn(&reply("pizza")).await;
    assert_eq!(second.response(), first.response());
    assert_eq!(scripted.call_count(), 1);

    let third = h.orchestrator.handle_turn(&reply("change my trip")).await;
    assert!(matches!(third, TurnOutcome::Resolved { ref intent_id, .. } if intent_id == "ChangeFlight"));
}

#[tokio::test]
async fn test_registry_routes_unknown_intents_to_fallback() {
    let registry = IntentRegistry::new("FallbackIntent")
        .with("BookFlight", |_: &ConversationContext| TurnResponse::text("booking"))
        .with("FallbackIntent", |_: &ConversationContext| TurnResponse::text("fallback"));
    let context = ConversationContext {
        session_id: SESSION.to_string(),
        locale: "en_US".to_string(),
        utterance: "x".to_string(),
        clarification_reply: None,
        active_intent: interp("Nope", 1.0),
        attributes: SessionAttributes::new(),
    };

    assert!(registry.contains("BookFlight"));
    assert_eq!(registry.dispatch("BookFlight", &context), TurnResponse::text("booking"));
    assert_eq!(registry.dispatch("Nope", &context), TurnResponse::text("fallback"));
    assert_eq!(
        IntentRegistry::new("FallbackIntent").dispatch("Nope", &context).messages.len(),
        1
    );
}

#[tokio::test]
async fn test_telemetry_carries_no_user_content() {
    let mut h = harness(DisambiguationConfig::default());
    h.orchestrator.handle_turn(&ambiguous_flight_turn()).await;
    h.orchestrator.handle_turn(&reply("change flight")).await;

    let events: Vec<&TelemetryEvent> = h.orchestrator.telemetry.events().collect();
    let dump = serde_json::to_string(&events).unwrap();
    for forbidden in ["I need help", "Change Flight", "ChangeFlight", "change flight", "Which would you"] {
        assert!(!dump.contains(forbidden), "telemetry leaked {:?}", forbidden);
    }

    let snapshot = h.orchestrator.telemetry.snapshot();
    assert_eq!(snapshot.outcome_stats.resolved, 1);
    assert_eq!(snapshot.outcome_stats.resolution_rate, 1.0);
}
