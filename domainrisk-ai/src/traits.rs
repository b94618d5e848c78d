// domainrisk-ai/src/traits.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use domainrisk_common::models::{OverallResult, Recommendation, TrademarkResult, ViceResult};
use domainrisk_common::Error;

/// Configuration for the OpenAI-backed explainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// API key; empty means the explainer is disabled.
    pub api_key: String,

    /// Chat model identifier.
    pub model: String,

    /// Base URL for API requests.
    pub base_url: String,

    /// Sampling temperature.
    pub temperature: f64,

    /// Maximum completion tokens per request.
    pub max_tokens: u32,

    /// Force-disable regardless of credentials.
    pub disabled: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            api_key: String::new(),
            model: "gpt-4.1-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.2,
            max_tokens: 1500,
            disabled: false,
        }
    }
}

impl AiConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Self {
        let mut cfg = AiConfig::default();
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            cfg.api_key = key.trim().to_string();
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                cfg.model = model.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                cfg.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(temp) = std::env::var("OPENAI_TEMPERATURE") {
            if let Ok(v) = temp.trim().parse::<f64>() {
                if v > 0.0 {
                    cfg.temperature = v;
                }
            }
        }
        if let Ok(max) = std::env::var("OPENAI_MAX_TOKENS") {
            if let Ok(v) = max.trim().parse::<u32>() {
                if v > 0 {
                    cfg.max_tokens = v;
                }
            }
        }
        if let Ok(disable) = std::env::var("DISABLE_AI") {
            cfg.disabled = disable.trim().eq_ignore_ascii_case("true");
        }
        cfg
    }

    pub fn enabled(&self) -> bool {
        !self.disabled && !self.api_key.trim().is_empty()
    }
}

/// The signals that feed an AI explanation for one domain.
#[derive(Debug, Clone, Default)]
pub struct ExplanationInput {
    pub domain: String,
    pub trademark: TrademarkResult,
    pub vice: ViceResult,
    pub overall: Option<OverallResult>,
    pub marks_count: usize,
    pub domains_count: i64,
    pub close_matches: Vec<String>,
    pub second_level: String,
    pub top_level: String,
    pub domain_tokens: Vec<String>,
    pub vice_terms: Vec<String>,
    pub recommendation: Option<Recommendation>,
    pub allow_override: bool,
    pub has_substring_alerts: bool,
    pub commercial_override: bool,
    pub commercial_source: String,
    pub commercial_similarity: f64,
    pub commercial_price: f64,
}

/// Structured response expected from the explainer.
#[derive(Debug, Clone, Default)]
pub struct Decision {
    pub narrative: String,
    pub trademark_score: Option<i32>,
    pub vice_score: Option<i32>,
    pub recommendation: Option<Recommendation>,
    pub confidence: Option<f64>,
}

/// AI-backed explanation capability. Implementations must be cheap to
/// share behind an `Arc<dyn Explainer>`.
#[async_trait]
pub trait Explainer: Send + Sync {
    /// Whether outbound calls can be made at all.
    fn enabled(&self) -> bool;

    /// Produce a narrative and optional score/recommendation overrides
    /// for the supplied evaluation signals.
    async fn explain(&self, input: &ExplanationInput) -> Result<Decision, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_configuration_controls_enablement() {
        std::env::set_var("OPENAI_API_KEY", "sk-env");
        std::env::set_var("OPENAI_MODEL", "gpt-test");
        std::env::set_var("DISABLE_AI", "true");

        let cfg = AiConfig::from_env();
        assert_eq!(cfg.api_key, "sk-env");
        assert_eq!(cfg.model, "gpt-test");
        assert!(cfg.disabled);
        assert!(!cfg.enabled());

        std::env::remove_var("DISABLE_AI");
        let cfg = AiConfig::from_env();
        assert!(cfg.enabled());

        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("OPENAI_MODEL");
    }
}
