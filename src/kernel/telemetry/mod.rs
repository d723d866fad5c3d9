//! Disambiguation telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer. It is never read by the
//! analyzer, selector, composer or matcher.
//!
//! # PRIVACY INVARIANT
//! Events carry no user content (utterances, labels, prompt text) and no
//! intent names. Only clarification ids, enums and counts.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::{TelemetryEvent, SkipReason, SessionOperation};
pub use metrics::TelemetrySnapshot;
pub use recorder::TelemetryRecorder;
