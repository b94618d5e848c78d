// domainrisk-ai/src/lib.rs

pub mod chain;
pub mod client;
pub mod traits;

// Re-export public APIs
pub use chain::with_fallback;
pub use client::OpenAiExplainer;
pub use traits::{AiConfig, Decision, ExplanationInput, Explainer};
