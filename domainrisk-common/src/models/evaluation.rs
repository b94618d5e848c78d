// domainrisk-common/src/models/evaluation.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scoring::{Recommendation, TrademarkType};

/// Per-domain scoring outcome, keyed by `domain_normalized` and reused
/// across every batch containing that domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub domain: String,
    pub domain_normalized: String,
    pub trademark_score: i32,
    pub trademark_type: TrademarkType,
    pub matched_trademark: String,
    pub trademark_confidence: f64,
    pub vice_score: i32,
    pub vice_categories_json: String,
    pub vice_confidence: f64,
    pub overall_recommendation: Recommendation,
    pub processing_time_ms: i64,
    pub explanation: String,
    pub commercial_override: bool,
    pub commercial_source: String,
    pub commercial_similarity: f64,
    pub created_at: DateTime<Utc>,
}

impl Evaluation {
    /// Persist the vice categories as JSON text.
    pub fn set_vice_categories(&mut self, categories: &[String]) {
        self.vice_categories_json =
            serde_json::to_string(categories).unwrap_or_else(|_| "[]".to_string());
    }

    /// Decode the stored vice categories; malformed text reads as empty.
    pub fn vice_categories(&self) -> Vec<String> {
        if self.vice_categories_json.trim().is_empty() {
            return Vec::new();
        }
        serde_json::from_str(&self.vice_categories_json).unwrap_or_default()
    }
}

impl Default for Evaluation {
    fn default() -> Self {
        Evaluation {
            id: 0,
            domain: String::new(),
            domain_normalized: String::new(),
            trademark_score: 0,
            trademark_type: TrademarkType::None,
            matched_trademark: String::new(),
            trademark_confidence: 0.0,
            vice_score: 0,
            vice_categories_json: String::new(),
            vice_confidence: 0.0,
            overall_recommendation: Recommendation::Allow,
            processing_time_ms: 0,
            explanation: String::new(),
            commercial_override: false,
            commercial_source: String::new(),
            commercial_similarity: 0.0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}
