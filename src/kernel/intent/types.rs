use serde::{Serialize, Deserialize};

pub type IntentId = String;

/// One NLU hypothesis for the current utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub intent_id: IntentId,
    pub confidence: f64, // 0.0 to 1.0
}

impl Interpretation {
    pub fn new(intent_id: impl Into<IntentId>, confidence: f64) -> Self {
        Self {
            intent_id: intent_id.into(),
            confidence,
        }
    }

    /// Non-finite scores count as 0.0; everything else is clamped to [0, 1].
    pub fn sanitized(&self) -> Self {
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            intent_id: self.intent_id.clone(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerReason {
    LowConfidence,
    CloseScores,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub reason: TriggerReason,
    /// Sorted descending. Empty when `reason` is `None`.
    pub raw_candidates: Vec<Interpretation>,
}

impl Analysis {
    pub fn none() -> Self {
        Self {
            reason: TriggerReason::None,
            raw_candidates: Vec::new(),
        }
    }

    pub fn trigger(&self) -> bool {
        self.reason != TriggerReason::None
    }
}

/// An interpretation promoted into the clarification flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub intent_id: IntentId,
    pub display_label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Labels are pairwise distinct; ordered by descending confidence.
    Ready(Vec<Candidate>),
    InsufficientCandidates { available: usize, required: usize },
}
