use std::collections::HashSet;

use tracing::debug;

use super::label::{humanize, make_distinct};
use super::types::*;
use crate::config::DisambiguationConfig;

pub struct CandidateSelector;

impl CandidateSelector {
    pub fn new() -> Self {
        Self
    }

    /// Bound, dedupe and label the analyzer's raw candidates.
    ///
    /// 1. One slot per intent group (and per intent id), highest score wins.
    /// 2. Descending by score, truncated to `max_candidates`.
    /// 3. Humanized labels, made distinct in rank order.
    /// 4. Fewer than `min_candidates` left -> `InsufficientCandidates`.
    pub fn select(&self, raw: &[Interpretation], config: &DisambiguationConfig) -> Selection {
        let mut ranked: Vec<Interpretation> = raw.iter().map(Interpretation::sanitized).collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut seen_intents: HashSet<&str> = HashSet::new();
        let mut seen_groups: HashSet<&str> = HashSet::new();
        let mut kept: Vec<&Interpretation> = Vec::new();

        // `ranked` is already descending, so the first member seen is the representative.
        for interp in &ranked {
            if !seen_intents.insert(interp.intent_id.as_str()) {
                continue;
            }
            if let Some(group) = config.group_of(&interp.intent_id) {
                if !seen_groups.insert(group) {
                    debug!("Collapsed {} into group {}", interp.intent_id, group);
                    continue;
                }
            }
            kept.push(interp);
        }

        kept.truncate(config.max_candidates);

        if kept.len() < config.min_candidates {
            return Selection::InsufficientCandidates {
                available: kept.len(),
                required: config.min_candidates,
            };
        }

        let mut labels: Vec<String> = kept.iter().map(|i| humanize(&i.intent_id)).collect();
        make_distinct(&mut labels);

        let candidates = kept
            .into_iter()
            .zip(labels)
            .map(|(interp, display_label)| Candidate {
                intent_id: interp.intent_id.clone(),
                display_label,
                confidence: interp.confidence,
            })
            .collect();

        Selection::Ready(candidates)
    }
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::new()
    }
}
