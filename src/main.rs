use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use clarify::kernel::dispatch::{IntentDispatcher, IntentRegistry};
use clarify::kernel::event::{ConversationContext, TurnRequest, TurnResponse};
use clarify::kernel::intent::Interpretation;
use clarify::kernel::message::MessageCatalog;
use clarify::kernel::session::InMemorySessionStore;
use clarify::services::llm::{GenerationService, HttpGenerationService};
use clarify::{DisambiguationConfig, DisambiguationOrchestrator, TurnOutcome};

const SESSION_ID: &str = "console";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    // Args: [config.json] [messages_dir]
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => DisambiguationConfig::from_path(&PathBuf::from(path))?,
        None => DisambiguationConfig::default(),
    };

    let mut catalog = MessageCatalog::new(config.default_locale.clone());
    if let Some(dir) = args.next() {
        catalog.load_dir(&PathBuf::from(dir))?;
    }

    let registry = Arc::new(demo_registry(&config.fallback_intent));
    let generator: Option<Arc<dyn GenerationService>> = if config.ai.enabled {
        Some(Arc::new(HttpGenerationService::from_config(&config.ai)))
    } else {
        None
    };

    let mut orchestrator = DisambiguationOrchestrator::new(
        config,
        Arc::new(catalog),
        Arc::new(InMemorySessionStore::new()),
        registry.clone(),
        generator,
    )?;

    println!("Enter turns as `Intent=score Intent=score | utterance`, or plain text to answer.");
    println!("`:stats` prints telemetry, `:quit` exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" => break,
            ":stats" => {
                println!("{:#?}", orchestrator.telemetry.snapshot());
                continue;
            }
            _ => {}
        }

        let request = match parse_turn(line) {
            Ok(request) => request,
            Err(e) => {
                println!("! {}", e);
                continue;
            }
        };

        let outcome = orchestrator.handle_turn(&request).await;
        match &outcome {
            TurnOutcome::PassThrough => {
                // Normal dispatch: the host's job, done here for the demo.
                let top = request
                    .interpretations
                    .iter()
                    .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                    .cloned();
                match top {
                    Some(top) => {
                        let context = ConversationContext {
                            session_id: request.session_id.clone(),
                            locale: orchestrator.config().default_locale.clone(),
                            utterance: request.utterance.clone(),
                            clarification_reply: None,
                            active_intent: top.clone(),
                            attributes: Default::default(),
                        };
                        print_response(&registry.dispatch(&top.intent_id, &context));
                    }
                    None => println!("(nothing to dispatch)"),
                }
            }
            other => {
                println!("[{:?}]", other.state());
                if let Some(response) = other.response() {
                    print_response(response);
                }
            }
        }
    }

    Ok(())
}

fn parse_turn(line: &str) -> Result<TurnRequest> {
    let Some((scores, utterance)) = line.split_once('|') else {
        return Ok(TurnRequest::text(SESSION_ID, line));
    };

    let mut interpretations = Vec::new();
    for token in scores.split_whitespace() {
        let (intent, score) = token
            .split_once('=')
            .with_context(|| format!("expected Intent=score, got `{}`", token))?;
        let score: f64 = score
            .parse()
            .with_context(|| format!("bad score for {}", intent))?;
        interpretations.push(Interpretation::new(intent, score));
    }

    Ok(TurnRequest::text(SESSION_ID, utterance.trim()).with_interpretations(interpretations))
}

fn print_response(response: &TurnResponse) {
    for message in &response.messages {
        println!("> {}", message);
    }
    for (i, choice) in response.choices.iter().enumerate() {
        println!("  [{}] {}", i + 1, choice.label);
    }
}

fn demo_registry(fallback_intent: &str) -> IntentRegistry {
    IntentRegistry::new(fallback_intent)
        .with("BookFlight", |_: &ConversationContext| TurnResponse::text("Let's book a flight. Where to?"))
        .with("ChangeFlight", |_: &ConversationContext| {
            TurnResponse::text("Sure, what's your reservation number?")
        })
        .with("CancelFlight", |_: &ConversationContext| {
            TurnResponse::text("I can cancel that. What's your reservation number?")
        })
        .with("TrackBaggage", |_: &ConversationContext| {
            TurnResponse::text("What's your baggage claim number?")
        })
        .with(fallback_intent, |_: &ConversationContext| {
            TurnResponse::text("Sorry, I didn't catch that. You can book, change or cancel a flight.")
        })
}
