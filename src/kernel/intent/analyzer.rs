use tracing::debug;

use super::types::*;
use crate::config::DisambiguationConfig;

/// Absorbs float noise so that e.g. 0.75 - 0.60 is a gap of exactly 0.15.
const SCORE_EPSILON: f64 = 1e-9;

pub struct ConfidenceAnalyzer;

impl ConfidenceAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether the NLU result is ambiguous enough to ask the user.
    ///
    /// Input order is not trusted: interpretations are re-sorted descending
    /// (stable, so equal scores keep their incoming order).
    pub fn analyze(&self, interpretations: &[Interpretation], config: &DisambiguationConfig) -> Analysis {
        let mut ranked: Vec<Interpretation> = interpretations.iter().map(Interpretation::sanitized).collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        if ranked.is_empty() || ranked.len() < config.min_candidates {
            return Analysis::none();
        }

        let top = ranked[0].confidence;

        if top < config.confidence_threshold {
            debug!("Low confidence: top={:.3} < {:.3}", top, config.confidence_threshold);
            return Analysis {
                reason: TriggerReason::LowConfidence,
                raw_candidates: ranked,
            };
        }

        if let Some(second) = ranked.get(1) {
            if top - second.confidence <= config.similarity_threshold + SCORE_EPSILON {
                debug!("Close scores: top={:.3}, second={:.3}", top, second.confidence);
                let close: Vec<Interpretation> = ranked
                    .into_iter()
                    .filter(|i| top - i.confidence <= config.similarity_threshold + SCORE_EPSILON)
                    .collect();
                return Analysis {
                    reason: TriggerReason::CloseScores,
                    raw_candidates: close,
                };
            }
        }

        Analysis::none()
    }
}

impl Default for ConfidenceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
