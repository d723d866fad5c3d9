use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use super::keys::{FALLBACK_KEY, MULTIPLE_OPTIONS_KEY, TWO_OPTIONS_KEY};
use crate::errors::ConfigError;

pub type MessageParams = BTreeMap<String, String>;

/// Localized string lookup.
///
/// Implementors only provide raw templates; [`MessageStore::resolve`] handles
/// fallback and placeholder substitution, so it never fails.
pub trait MessageStore: Send + Sync {
    fn lookup(&self, key: &str, locale: &str) -> Option<String>;

    fn resolve(&self, key: &str, locale: &str, params: &MessageParams) -> String {
        let template = self
            .lookup(key, locale)
            .or_else(|| {
                debug!("Message key {} missing for {}, using fallback", key, locale);
                self.lookup(FALLBACK_KEY, locale)
            })
            .unwrap_or_else(|| BUILTIN_FALLBACK.to_string());
        render(&template, params)
    }
}

pub const BUILTIN_FALLBACK: &str = "I'm not sure what you're looking for. Please choose one of these: {options}.";
pub const BUILTIN_CONJUNCTION: &str = "or";
pub const CONJUNCTION_KEY: &str = "options_conjunction";

const BUILTIN_MESSAGES: &[(&str, &str)] = &[
    (TWO_OPTIONS_KEY, "I can help you with two things: {options}. Which would you like to do?"),
    (MULTIPLE_OPTIONS_KEY, "I can help you with several things: {options}. What would you like to do?"),
    (FALLBACK_KEY, BUILTIN_FALLBACK),
    (CONJUNCTION_KEY, BUILTIN_CONJUNCTION),
];

/// Replace `{name}` placeholders. Unknown placeholders are left as written.
pub fn render(template: &str, params: &MessageParams) -> String {
    let mut out = template.to_string();
    for (name, value) in params {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

/// In-memory catalog: locale -> key -> template.
///
/// Lookup order is the requested locale, its language (`en_GB` -> `en`),
/// the default locale, then the built-in English defaults.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    default_locale: String,
    locales: HashMap<String, HashMap<String, String>>,
}

impl MessageCatalog {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            locales: HashMap::new(),
        }
    }

    pub fn insert(&mut self, locale: &str, key: &str, template: &str) {
        self.locales
            .entry(locale.to_string())
            .or_default()
            .insert(key.to_string(), template.to_string());
    }

    /// Merge a JSON object of `{"key": "template"}` into `locale`.
    pub fn load_json_str(&mut self, locale: &str, raw: &str) -> Result<(), ConfigError> {
        let entries: HashMap<String, String> = serde_json::from_str(raw)?;
        let count = entries.len();
        self.locales.entry(locale.to_string()).or_default().extend(entries);
        debug!("Loaded {} messages for locale {}", count, locale);
        Ok(())
    }

    /// Load every `<locale>.json` in `dir`. Unreadable files are skipped with a warning.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), ConfigError> {
        let entries = fs::read_dir(dir).map_err(|source| ConfigError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(locale) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(raw) => self.load_json_str(&locale, &raw)?,
                Err(e) => warn!("Skipping message file {}: {}", path.display(), e),
            }
        }
        Ok(())
    }

    fn lookup_in(&self, locale: &str, key: &str) -> Option<String> {
        self.locales.get(locale).and_then(|m| m.get(key)).cloned()
    }
}

impl MessageStore for MessageCatalog {
    fn lookup(&self, key: &str, locale: &str) -> Option<String> {
        let language = locale.split(['_', '-']).next().unwrap_or(locale);
        self.lookup_in(locale, key)
            .or_else(|| self.lookup_in(language, key))
            .or_else(|| self.lookup_in(&self.default_locale, key))
            .or_else(|| {
                BUILTIN_MESSAGES
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.to_string())
            })
    }
}

/// "A", "A or B", "A, B, or C".
pub fn join_options(labels: &[&str], conjunction: &str) -> String {
    match labels {
        [] => String::new(),
        [only] => only.to_string(),
        [a, b] => format!("{} {} {}", a, conjunction, b),
        [rest @ .., last] => format!("{}, {} {}", rest.join(", "), conjunction, last),
    }
}
