pub mod intent;
pub mod message;
pub mod compose;
pub mod session;
pub mod matcher;
pub mod dispatch;
pub mod event;
pub mod orchestrator;
pub mod telemetry;
