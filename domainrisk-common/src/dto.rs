// domainrisk-common/src/dto.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Evaluation, Recommendation, TrademarkType};

/// Wire representation of a persisted evaluation. Floats are rounded to
/// two decimals at conversion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationDto {
    pub id: i64,
    pub domain: String,
    pub trademark_score: i32,
    pub trademark_type: TrademarkType,
    pub matched_trademark: String,
    pub trademark_confidence: f64,
    pub vice_score: i32,
    pub vice_categories: Vec<String>,
    pub vice_confidence: f64,
    pub overall_recommendation: Recommendation,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub explanation: String,
    pub commercial_override: bool,
    pub commercial_source: String,
    pub commercial_similarity: f64,
}

impl From<&Evaluation> for EvaluationDto {
    fn from(e: &Evaluation) -> Self {
        EvaluationDto {
            id: e.id,
            domain: e.domain.clone(),
            trademark_score: e.trademark_score,
            trademark_type: e.trademark_type,
            matched_trademark: e.matched_trademark.clone(),
            trademark_confidence: round2(e.trademark_confidence),
            vice_score: e.vice_score,
            vice_categories: e.vice_categories(),
            vice_confidence: round2(e.vice_confidence),
            overall_recommendation: e.overall_recommendation,
            confidence: round2(min_confidence(e.trademark_confidence, e.vice_confidence)),
            created_at: e.created_at,
            explanation: e.explanation.trim().to_string(),
            commercial_override: e.commercial_override,
            commercial_source: e.commercial_source.clone(),
            commercial_similarity: round2(e.commercial_similarity),
        }
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Minimum of two confidences, where a zero operand yields the other.
pub fn min_confidence(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        return b;
    }
    if b == 0.0 {
        return a;
    }
    a.min(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(0.956), 0.96);
        assert_eq!(round2(0.954), 0.95);
        assert_eq!(round2(1.0), 1.0);
    }

    #[test]
    fn min_confidence_treats_zero_as_missing() {
        assert_eq!(min_confidence(0.0, 0.9), 0.9);
        assert_eq!(min_confidence(0.8, 0.0), 0.8);
        assert_eq!(min_confidence(0.8, 0.9), 0.8);
    }

    #[test]
    fn dto_carries_trimmed_explanation_and_categories() {
        let mut eval = Evaluation {
            domain: "example.com".into(),
            domain_normalized: "example.com".into(),
            trademark_confidence: 0.4,
            vice_confidence: 0.99,
            explanation: "  fine.  ".into(),
            ..Default::default()
        };
        eval.set_vice_categories(&["casino".to_string()]);

        let dto = EvaluationDto::from(&eval);
        assert_eq!(dto.explanation, "fine.");
        assert_eq!(dto.vice_categories, vec!["casino".to_string()]);
        assert_eq!(dto.confidence, 0.4);
    }
}
