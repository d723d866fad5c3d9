//! Intent identifier → display label.
//!
//! `BookFlight`, `book_flight` and `book-flight` all become `Book Flight`.
//! Acronym runs stay together (`HTTPRequest` → `HTTP Request`) and digits
//! form their own word (`Gate2Change` → `Gate 2 Change`).

use std::collections::HashSet;

/// Humanize one identifier. Deterministic; never empty for a nonempty input.
pub fn humanize(intent_id: &str) -> String {
    let chars: Vec<char> = intent_id.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            flush(&mut current, &mut words);
            continue;
        }
        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            if is_boundary(prev, c, next) {
                flush(&mut current, &mut words);
            }
        }
        current.push(c);
    }
    flush(&mut current, &mut words);

    if words.is_empty() {
        return intent_id.to_string();
    }
    words.iter().map(|w| capitalize(w)).collect::<Vec<_>>().join(" ")
}

fn is_boundary(prev: char, c: char, next: Option<char>) -> bool {
    // bookFlight
    if prev.is_lowercase() && c.is_uppercase() {
        return true;
    }
    // HTTPRequest: split before the last capital of an acronym run
    if prev.is_uppercase() && c.is_uppercase() && next.map_or(false, |n| n.is_lowercase()) {
        return true;
    }
    prev.is_ascii_digit() != c.is_ascii_digit()
}

fn flush(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase, punctuation dropped, whitespace collapsed.
///
/// Labels must be distinct under this form, and replies are compared in it.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Make `labels` pairwise distinct (by [`normalize`]) in place.
///
/// Earlier entries win; a later duplicate gets ` (2)`, ` (3)`, ... until it is unique.
pub fn make_distinct(labels: &mut [String]) {
    let mut seen: HashSet<String> = HashSet::new();
    for label in labels.iter_mut() {
        if seen.insert(normalize(label)) {
            continue;
        }
        let base = label.clone();
        let mut n = 2;
        loop {
            let attempt = format!("{} ({})", base, n);
            if seen.insert(normalize(&attempt)) {
                *label = attempt;
                break;
            }
            n += 1;
        }
    }
}
