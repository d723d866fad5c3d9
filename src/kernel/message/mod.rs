pub mod keys;
pub mod catalog;

pub use keys::{KeyRule, MessageKey, MessageKeyResolver, FALLBACK_KEY};
pub use catalog::{MessageCatalog, MessageParams, MessageStore};
