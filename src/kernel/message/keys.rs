use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{DisambiguationConfig, IntentGroups};

pub const PAIR_KEY_SEPARATOR: &str = "_or_";
pub const GROUP_KEY_SUFFIX: &str = "_disambiguation";
pub const TWO_OPTIONS_KEY: &str = "two_options";
pub const MULTIPLE_OPTIONS_KEY: &str = "multiple_options";
/// Every message store must be able to resolve this key.
pub const FALLBACK_KEY: &str = "disambiguation_fallback";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyRule {
    Pair,
    Group,
    Cardinality,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageKey {
    pub key: String,
    pub rule: KeyRule,
}

impl MessageKey {
    fn new(key: impl Into<String>, rule: KeyRule) -> Self {
        Self { key: key.into(), rule }
    }
}

pub fn pair_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}{}", first, PAIR_KEY_SEPARATOR, second)
}

pub fn group_key(group: &str) -> String {
    format!("{}{}", group, GROUP_KEY_SUFFIX)
}

pub struct MessageKeyResolver;

impl MessageKeyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Pick the message key for a final candidate set. Total: always returns a key.
    ///
    /// Pair and group keys only win when the config actually overrides them;
    /// cardinality keys are expected to live in the message store.
    pub fn resolve(&self, intent_ids: &[&str], config: &DisambiguationConfig) -> MessageKey {
        let overrides = &config.message_overrides;

        if let [a, b] = intent_ids {
            let key = pair_key(a, b);
            if overrides.contains_key(&key) {
                return MessageKey::new(key, KeyRule::Pair);
            }
        }

        if !intent_ids.is_empty() {
            for groups in [&config.message_groups, &config.intent_groups] {
                if let Some(key) = shared_group_key(intent_ids, groups, overrides) {
                    return MessageKey::new(key, KeyRule::Group);
                }
            }
        }

        match intent_ids.len() {
            2 => MessageKey::new(TWO_OPTIONS_KEY, KeyRule::Cardinality),
            n if n > 2 => MessageKey::new(MULTIPLE_OPTIONS_KEY, KeyRule::Cardinality),
            _ => MessageKey::new(FALLBACK_KEY, KeyRule::Fallback),
        }
    }
}

impl Default for MessageKeyResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn shared_group_key(
    intent_ids: &[&str],
    groups: &IntentGroups,
    overrides: &BTreeMap<String, String>,
) -> Option<String> {
    groups
        .iter()
        .filter(|(_, members)| intent_ids.iter().all(|id| members.contains(*id)))
        .map(|(group, _)| group_key(group))
        .find(|key| overrides.contains_key(key))
}
