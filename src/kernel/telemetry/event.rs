use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::kernel::compose::CompositionSource;
use crate::kernel::intent::TriggerReason;
use crate::kernel::matcher::MatchKind;
use crate::kernel::message::KeyRule;

// Allowed: IDs, Counts, Enums
// Forbidden: Utterances, Labels, Prompt Text, Intent Names

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    Analysis {
        reason: TriggerReason,
        interpretations: usize,
    },

    Skipped {
        reason: SkipReason,
    },

    PromptEmitted {
        clarification_id: Uuid,
        candidates: usize,
        key_rule: KeyRule,
        source: CompositionSource,
    },

    Reprompt {
        clarification_id: Uuid,
        turns_remaining: u32,
    },

    /// Same delivery seen twice; prompt re-emitted without consuming a turn.
    DuplicateDelivery {
        clarification_id: Uuid,
    },

    Resolved {
        clarification_id: Uuid,
        match_kind: MatchKind,
    },

    Expired {
        clarification_id: Uuid,
    },

    /// A stored record could not be decoded and was dropped.
    PendingDiscarded,

    SessionFailure {
        operation: SessionOperation,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    NoTrigger,
    InsufficientCandidates,
    SessionUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOperation {
    Load,
    Save,
}
