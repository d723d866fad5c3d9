use std::collections::VecDeque;
use super::event::{TelemetryEvent, SkipReason};
use crate::kernel::compose::{CompositionSource, DegradeCause};
use crate::kernel::intent::TriggerReason;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub analysis_stats: AnalysisStats,
    pub prompt_stats: PromptStats,
    pub outcome_stats: OutcomeStats,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisStats {
    pub low_confidence: u64,
    pub close_scores: u64,
    pub not_triggered: u64,
    pub insufficient_candidates: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptStats {
    pub emitted: u64,
    pub static_templates: u64,
    pub generated: u64,
    pub degraded: u64,
    pub degraded_by_timeout: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeStats {
    pub resolved: u64,
    pub reprompts: u64,
    pub expired: u64,
    pub duplicate_deliveries: u64,
    pub discarded_records: u64,
    pub session_failures: u64,
    /// resolved / (resolved + expired); 0.0 before any clarification closes.
    pub resolution_rate: f64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            TelemetryEvent::Analysis { reason, .. } => match reason {
                TriggerReason::LowConfidence => snap.analysis_stats.low_confidence += 1,
                TriggerReason::CloseScores => snap.analysis_stats.close_scores += 1,
                TriggerReason::None => snap.analysis_stats.not_triggered += 1,
            },
            TelemetryEvent::Skipped { reason } => match reason {
                SkipReason::InsufficientCandidates => snap.analysis_stats.insufficient_candidates += 1,
                SkipReason::NoTrigger | SkipReason::SessionUnavailable => {}
            },
            TelemetryEvent::PromptEmitted { source, .. } => {
                snap.prompt_stats.emitted += 1;
                match source {
                    CompositionSource::Static => snap.prompt_stats.static_templates += 1,
                    CompositionSource::Generated => snap.prompt_stats.generated += 1,
                    CompositionSource::Degraded(cause) => {
                        snap.prompt_stats.degraded += 1;
                        if *cause == DegradeCause::Timeout {
                            snap.prompt_stats.degraded_by_timeout += 1;
                        }
                    }
                }
            }
            TelemetryEvent::Reprompt { .. } => snap.outcome_stats.reprompts += 1,
            TelemetryEvent::DuplicateDelivery { .. } => snap.outcome_stats.duplicate_deliveries += 1,
            TelemetryEvent::Resolved { .. } => snap.outcome_stats.resolved += 1,
            TelemetryEvent::Expired { .. } => snap.outcome_stats.expired += 1,
            TelemetryEvent::PendingDiscarded => snap.outcome_stats.discarded_records += 1,
            TelemetryEvent::SessionFailure { .. } => snap.outcome_stats.session_failures += 1,
        }
    }

    let closed = snap.outcome_stats.resolved + snap.outcome_stats.expired;
    if closed > 0 {
        snap.outcome_stats.resolution_rate = snap.outcome_stats.resolved as f64 / closed as f64;
    }

    snap
}
