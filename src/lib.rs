pub mod config;
pub mod errors;
pub mod kernel;
pub mod services;

// Re-export specific items for convenient access
pub use config::{AiConfig, DisambiguationConfig};
pub use kernel::orchestrator::{DisambiguationOrchestrator, DisambiguationState, TurnOutcome};
pub use kernel::event::{ConversationContext, TurnRequest, TurnResponse};
