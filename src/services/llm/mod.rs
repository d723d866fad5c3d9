pub mod client;

pub use client::{GenerationRequest, GenerationService, HttpGenerationService};
