use serde::{Deserialize, Serialize};

use super::intent::label::normalize;
use super::session::PendingDisambiguation;

const ORDINAL_WORDS: [&str; 10] = [
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

/// Replies shorter than this never go through substring matching.
const MIN_SUBSTRING_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    ExactLabel,
    NormalizedLabel,
    IntentId,
    Ordinal,
    Substring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyMatch {
    /// Index into the pending record's candidates.
    pub index: usize,
    pub kind: MatchKind,
}

pub struct ReplyMatcher;

impl ReplyMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Map a reply onto one of the offered choices.
    ///
    /// Ladder, first hit wins: case-insensitive label, normalized label,
    /// intent id, ordinal ("2", "b", "second"), then word-aligned substring.
    /// Substring: a label the reply names in full wins (the longest, if
    /// labels nest); otherwise the reply must sit inside exactly one label.
    pub fn match_reply(&self, reply: &str, pending: &PendingDisambiguation) -> Option<ReplyMatch> {
        let labels = &pending.candidate_labels;
        let trimmed = reply.trim();
        if trimmed.is_empty() {
            return None;
        }

        let lowered = trimmed.to_lowercase();
        if let Some(index) = labels.iter().position(|l| l.trim().to_lowercase() == lowered) {
            return Some(ReplyMatch { index, kind: MatchKind::ExactLabel });
        }

        let norm = normalize(trimmed);
        if norm.is_empty() {
            return None;
        }
        if let Some(index) = labels.iter().position(|l| normalize(l) == norm) {
            return Some(ReplyMatch { index, kind: MatchKind::NormalizedLabel });
        }

        if let Some(index) = pending
            .candidate_intent_ids
            .iter()
            .position(|id| id.to_lowercase() == lowered)
        {
            return Some(ReplyMatch { index, kind: MatchKind::IntentId });
        }

        if let Some(index) = ordinal_index(&norm, labels.len()) {
            return Some(ReplyMatch { index, kind: MatchKind::Ordinal });
        }

        if norm.chars().count() < MIN_SUBSTRING_CHARS {
            return None;
        }
        let padded_reply = format!(" {} ", norm);
        let padded_labels: Vec<Option<String>> = labels
            .iter()
            .map(|l| Some(normalize(l)).filter(|n| !n.is_empty()).map(|n| format!(" {} ", n)))
            .collect();

        // Labels named in full by the reply; nested labels resolve to the longest.
        let named: Vec<usize> = padded_labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.as_ref().map_or(false, |l| padded_reply.contains(l.as_str())))
            .map(|(i, _)| i)
            .collect();
        if let Some(index) = unique_longest(&named, &padded_labels) {
            return Some(ReplyMatch { index, kind: MatchKind::Substring });
        }

        let partial: Vec<usize> = padded_labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.as_ref().map_or(false, |l| l.contains(padded_reply.as_str())))
            .map(|(i, _)| i)
            .collect();

        match partial.as_slice() {
            [index] => Some(ReplyMatch { index: *index, kind: MatchKind::Substring }),
            _ => None,
        }
    }
}

fn unique_longest(indices: &[usize], padded_labels: &[Option<String>]) -> Option<usize> {
    let len = |i: &usize| padded_labels[*i].as_ref().map_or(0, |l| l.len());
    let longest = indices.iter().map(len).max()?;
    let tied: Vec<usize> = indices.iter().copied().filter(|i| len(i) == longest).collect();
    match tied.as_slice() {
        [index] => Some(*index),
        _ => None,
    }
}

impl Default for ReplyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// "2" / "b" / "second" / "the second one" -> 1, when in range.
fn ordinal_index(norm: &str, count: usize) -> Option<usize> {
    let core = norm
        .trim_start_matches("the ")
        .trim_start_matches("option ")
        .trim_start_matches("number ")
        .trim_end_matches(" one")
        .trim();

    let index = if let Ok(n) = core.parse::<usize>() {
        n.checked_sub(1)?
    } else if core.len() == 1 && core.chars().all(|c| c.is_ascii_lowercase()) {
        (core.as_bytes()[0] - b'a') as usize
    } else {
        ORDINAL_WORDS.iter().position(|w| *w == core)?
    };

    (index < count).then_some(index)
}
