// domainrisk-core/src/scoring/overall.rs

use domainrisk_common::dto::min_confidence;
use domainrisk_common::models::{OverallResult, Recommendation, TrademarkResult, ViceResult};

/// Merge trademark and vice outcomes into a recommendation.
pub fn combine_recommendation(tr: &TrademarkResult, vice: &ViceResult) -> OverallResult {
    let recommendation = if tr.score >= 4 || vice.score >= 4 {
        Recommendation::Block
    } else if vice.score == 3 || tr.score == 3 {
        Recommendation::Review
    } else if tr.score == 2 || tr.score == 1 {
        Recommendation::AllowWithCaution
    } else {
        Recommendation::Allow
    };

    OverallResult {
        recommendation,
        confidence: min_confidence(tr.confidence, vice.confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainrisk_common::models::TrademarkType;

    fn tr(score: i32, confidence: f64) -> TrademarkResult {
        TrademarkResult {
            score,
            mark_type: TrademarkType::None,
            matched_trademark: String::new(),
            confidence,
        }
    }

    fn vice(score: i32, confidence: f64) -> ViceResult {
        ViceResult {
            score,
            categories: Vec::new(),
            confidence,
        }
    }

    #[test]
    fn recommendation_matrix() {
        let cases = [
            (tr(5, 1.0), vice(0, 0.9), Recommendation::Block),
            (tr(0, 0.9), vice(4, 0.95), Recommendation::Block),
            (tr(3, 0.7), vice(0, 0.9), Recommendation::Review),
            (tr(0, 0.9), vice(3, 0.8), Recommendation::Review),
            (tr(2, 0.6), vice(0, 0.9), Recommendation::AllowWithCaution),
            (tr(1, 0.5), vice(0, 0.9), Recommendation::AllowWithCaution),
            (tr(0, 0.9), vice(0, 0.99), Recommendation::Allow),
        ];
        for (t, v, expected) in cases {
            assert_eq!(combine_recommendation(&t, &v).recommendation, expected);
        }
    }

    #[test]
    fn confidence_is_minimum_of_operands() {
        let overall = combine_recommendation(&tr(0, 0.4), &vice(0, 0.99));
        assert_eq!(overall.confidence, 0.4);
    }

    #[test]
    fn zero_confidence_defers_to_other_operand() {
        let overall = combine_recommendation(&tr(0, 0.0), &vice(0, 0.99));
        assert_eq!(overall.confidence, 0.99);
    }
}
