pub mod types;
pub mod label;
pub mod analyzer;
pub mod selector;

pub use types::*;
pub use analyzer::ConfidenceAnalyzer;
pub use selector::CandidateSelector;
