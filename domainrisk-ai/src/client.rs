// domainrisk-ai/src/client.rs

use std::fmt::Write as _;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use domainrisk_common::models::Recommendation;
use domainrisk_common::Error;

use crate::traits::{AiConfig, Decision, ExplanationInput, Explainer};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are a domain risk analyst. Reply with a strict JSON object containing keys narrative, trademark_score, vice_score, recommendation, and confidence. Evaluate trademark_score and vice_score as integers 0-5 (5 = severe conflict, 0 = clean) using the supplied evidence; only assign 4-5 for clear exact-match conflicts or severe vice activity. Narrative must contain exactly two sentences separated by a newline, and the first sentence must reference the second-level label or its meaning directly. Do not start any sentence with 'The term', 'Overall', 'I', 'I'd', 'Feels like', or 'It comes across', and avoid repeating the same opening clause across responses. Do not prefix the second sentence with labels such as 'Stance:' or 'Recommendation:'; instead, lead with a varied action-oriented phrase that makes the decision sound human. Vary vocabulary and sentence structure between cases so successive narratives do not sound alike. recommendation must be one of BLOCK, REVIEW, ALLOW_WITH_CAUTION, or ALLOW. confidence must be a decimal between 0 and 1. Emit nothing outside the JSON object.";

/// Explainer implementation backed by the OpenAI chat-completions API.
pub struct OpenAiExplainer {
    http: reqwest::Client,
    config: AiConfig,
}

impl OpenAiExplainer {
    /// Construct a client if the supplied configuration carries usable
    /// credentials.
    pub fn new(config: AiConfig) -> Result<Self, Error> {
        if !config.enabled() {
            return Err(Error::AiDisabled);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(OpenAiExplainer { http, config })
    }

    fn build_payload(&self, input: &ExplanationInput) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_user_prompt(input) },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl Explainer for OpenAiExplainer {
    fn enabled(&self) -> bool {
        self.config.enabled()
    }

    async fn explain(&self, input: &ExplanationInput) -> Result<Decision, Error> {
        if !self.enabled() {
            return Err(Error::AiDisabled);
        }

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.build_payload(input))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        let decoded: ChatCompletionResponse = response.json().await?;
        let content = decoded
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        let block = normalize_json_block(content);
        if block.is_empty() {
            return Err(Error::Parse("openai empty narrative".to_string()));
        }
        debug!(bytes = block.len(), "parsed ai response block");

        let raw: RawDecision = serde_json::from_str(&block)?;
        let decision = sanitize_decision(raw);
        if decision.narrative.is_empty() {
            return Err(Error::Parse("ai narrative missing".to_string()));
        }
        if decision.recommendation.is_none() {
            return Err(Error::Parse("ai recommendation missing".to_string()));
        }
        Ok(decision)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default)]
    narrative: String,
    #[serde(default)]
    trademark_score: Option<i32>,
    #[serde(default)]
    vice_score: Option<i32>,
    #[serde(default)]
    recommendation: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

fn sanitize_decision(raw: RawDecision) -> Decision {
    Decision {
        narrative: raw.narrative.trim().to_string(),
        trademark_score: raw.trademark_score.map(|v| v.clamp(0, 5)),
        vice_score: raw.vice_score.map(|v| v.clamp(0, 5)),
        recommendation: raw
            .recommendation
            .and_then(|r| r.parse::<Recommendation>().ok()),
        confidence: raw.confidence.map(clamp_confidence),
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Extract the JSON object from a model reply that may wrap it in code
/// fences or surrounding prose.
fn normalize_json_block(input: &str) -> String {
    let mut trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        trimmed = rest;
        if let Some(idx) = trimmed.find('\n') {
            trimmed = &trimmed[idx + 1..];
        }
        if let Some(rest) = trimmed.strip_suffix("```") {
            trimmed = rest;
        }
    }
    let trimmed = trimmed.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end >= start => trimmed[start..=end].trim().to_string(),
        _ => trimmed.to_string(),
    }
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

fn build_user_prompt(input: &ExplanationInput) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Domain: {}", input.domain);
    let _ = writeln!(p, "Second-level label: {}", input.second_level.trim());
    let _ = writeln!(p, "Top-level domain: {}", input.top_level.trim());
    if !input.domain_tokens.is_empty() {
        let _ = writeln!(p, "Domain tokens: {}", input.domain_tokens.join(", "));
    }
    let _ = writeln!(
        p,
        "Trademark Score: {} ({})",
        input.trademark.score, input.trademark.mark_type
    );
    if !input.trademark.matched_trademark.is_empty() {
        let _ = writeln!(p, "Matched Trademark: {}", input.trademark.matched_trademark);
    }
    let _ = writeln!(p, "Trademark Confidence: {:.2}", input.trademark.confidence);
    let _ = writeln!(p, "Vice Score: {}", input.vice.score);
    if !input.vice.categories.is_empty() {
        let _ = writeln!(p, "Vice Categories: {}", input.vice.categories.join(", "));
    }
    if !input.vice_terms.is_empty() {
        let _ = writeln!(p, "Vice Terms: {}", input.vice_terms.join(", "));
    }
    let _ = writeln!(p, "Vice Confidence: {:.2}", input.vice.confidence);
    if let Some(overall) = &input.overall {
        let _ = writeln!(
            p,
            "Overall Recommendation: {} (confidence {:.2})",
            overall.recommendation, overall.confidence
        );
    }
    if input.marks_count > 0 {
        let _ = writeln!(p, "Marks in database: {}", input.marks_count);
    }
    if input.domains_count > 0 {
        let _ = writeln!(p, "Domains evaluated in batch: {}", input.domains_count);
    }
    if !input.close_matches.is_empty() {
        let _ = writeln!(
            p,
            "Closest trademark references: {}",
            input.close_matches.join("; ")
        );
    }
    if let Some(rec) = input.recommendation {
        let _ = writeln!(p, "Default recommendation: {rec}");
    }
    if input.allow_override {
        p.push_str("You may override the default recommendation if contextual evidence supports doing so.\n");
    }
    if input.has_substring_alerts {
        p.push_str("Some vice terms appear only as substrings of larger words; consider whether they are false positives.\n");
    }
    if !input.commercial_source.trim().is_empty() && input.commercial_similarity > 0.0 {
        let prefix = if input.commercial_override {
            "Commercial signal"
        } else {
            "Commercial context"
        };
        let _ = writeln!(
            p,
            "{prefix}: {} (similarity {:.2}).",
            input.commercial_source.trim(),
            input.commercial_similarity
        );
    } else if input.commercial_override && input.commercial_price > 0.0 {
        let _ = writeln!(
            p,
            "Commercial signal: historical sale around ${:.0} supports market demand.",
            input.commercial_price
        );
    }
    let _ = writeln!(
        p,
        "Heuristic trademark score suggestion (0-5): {}",
        input.trademark.score
    );
    let _ = writeln!(
        p,
        "Heuristic vice score suggestion (0-5): {}",
        input.vice.score
    );
    p.push_str("Use these heuristics as a starting point and adjust if the evidence supports a different outcome.\n");
    if !input.close_matches.is_empty() {
        p.push_str("Treat any listed mark that exactly matches the second-level label as a potential high-risk conflict.\n");
    } else {
        p.push_str("No exact USPTO matches were supplied; assume no direct conflict unless other evidence indicates otherwise.\n");
    }
    let second = input.second_level.trim();
    let top = input.top_level.trim();
    if !second.is_empty() {
        let _ = writeln!(
            p,
            "Anchor the first sentence of the narrative in the meaning of the label \"{second}\" and how the .{top} TLD influences intent."
        );
    }
    p.push_str("Sound like a human analyst weighing intent, evidence, and risk cues; use fresh vocabulary each time.\n");
    p.push_str("Avoid repeating the exact domain string; instead, paraphrase the label's meaning in natural language.\n");
    p.push_str("Open the first sentence with a vivid description or plausible use case rather than a stock phrase.\n");
    p.push_str("Let the second sentence start with an action-oriented verb or directive (e.g., 'Greenlight', 'Flag', 'Escalate for legal eyes') while justifying the decision; never use the exact same starter twice.\n");
    p.push_str("Explain the likely use of the name, cite any trademark or vice evidence you spot, and mention commercial signals if they matter.\n");
    p.push_str("Populate the JSON fields with your final judgement. Narrative must include two sentences separated by a newline; vary how you introduce the recommendation in the second sentence while clearly stating the action and justification.\n");
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_json_block_handles_fences() {
        let fenced = "```json\n{\"narrative\": \"ok\"}\n```";
        assert_eq!(normalize_json_block(fenced), "{\"narrative\": \"ok\"}");

        let prose = "Here you go: {\"a\": 1} thanks";
        assert_eq!(normalize_json_block(prose), "{\"a\": 1}");

        assert_eq!(normalize_json_block("   "), "");
    }

    #[test]
    fn sanitize_clamps_scores_and_confidence() {
        let raw = RawDecision {
            narrative: "  two sentences.\nhere.  ".to_string(),
            trademark_score: Some(9),
            vice_score: Some(-3),
            recommendation: Some("block".to_string()),
            confidence: Some(1.7),
        };
        let decision = sanitize_decision(raw);
        assert_eq!(decision.narrative, "two sentences.\nhere.");
        assert_eq!(decision.trademark_score, Some(5));
        assert_eq!(decision.vice_score, Some(0));
        assert_eq!(decision.recommendation, Some(Recommendation::Block));
        assert_eq!(decision.confidence, Some(1.0));
    }

    #[test]
    fn sanitize_drops_unknown_recommendation() {
        let raw = RawDecision {
            narrative: "n.\nn.".to_string(),
            trademark_score: None,
            vice_score: None,
            recommendation: Some("MAYBE".to_string()),
            confidence: None,
        };
        assert!(sanitize_decision(raw).recommendation.is_none());
    }

    #[test]
    fn disabled_config_refuses_construction() {
        let cfg = AiConfig {
            api_key: String::new(),
            ..Default::default()
        };
        assert!(matches!(OpenAiExplainer::new(cfg), Err(Error::AiDisabled)));

        let forced = AiConfig {
            api_key: "sk-test".to_string(),
            disabled: true,
            ..Default::default()
        };
        assert!(matches!(OpenAiExplainer::new(forced), Err(Error::AiDisabled)));
    }
}
