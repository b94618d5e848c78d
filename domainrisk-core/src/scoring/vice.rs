// domainrisk-core/src/scoring/vice.rs

use std::collections::HashMap;
use std::path::Path;

use domainrisk_common::models::ViceResult;

use crate::normalize::{sanitize_label, DomainProfile};
use crate::Error;

/// Evaluates domains against severity-tiered vice term lists.
pub struct ViceScorer {
    terms: HashMap<i32, Vec<String>>,
}

impl ViceScorer {
    /// Load term lists from a JSON object keyed by severity ("1".."5").
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(&data)?;
        Ok(Self::from_map(raw))
    }

    pub fn from_map(raw: HashMap<String, Vec<String>>) -> Self {
        let mut terms: HashMap<i32, Vec<String>> = HashMap::new();
        for (key, list) in raw {
            let severity: i32 = key.trim().parse().unwrap_or(0);
            let cleaned: Vec<String> = list
                .iter()
                .map(|term| sanitize_label(term))
                .filter(|term| !term.is_empty())
                .collect();
            if !cleaned.is_empty() {
                terms.insert(severity, cleaned);
            }
        }
        ViceScorer { terms }
    }

    /// Ensure the scorer has at least baseline configuration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.terms.is_empty() {
            return Err(Error::Parse("vice terms missing".to_string()));
        }
        Ok(())
    }

    /// Highest severity tier with any substring hit against the sanitized
    /// host or brand token; categories are the deduplicated sorted hits
    /// at that tier.
    pub fn score(&self, profile: &DomainProfile) -> ViceResult {
        let domain = sanitize_label(&profile.host);
        let brand = sanitize_label(&profile.brand_token);

        for severity in (1..=5).rev() {
            let Some(terms) = self.terms.get(&severity) else {
                continue;
            };
            let mut hits: Vec<String> = terms
                .iter()
                .filter(|term| domain.contains(term.as_str()) || brand.contains(term.as_str()))
                .cloned()
                .collect();
            if !hits.is_empty() {
                hits.sort();
                hits.dedup();
                return ViceResult {
                    score: severity,
                    categories: hits,
                    confidence: confidence_for_severity(severity),
                };
            }
        }

        ViceResult {
            score: 0,
            categories: Vec::new(),
            confidence: confidence_for_severity(0),
        }
    }
}

fn confidence_for_severity(severity: i32) -> f64 {
    match severity {
        4 | 5 => 0.95,
        3 => 0.80,
        2 => 0.70,
        1 => 0.60,
        _ => 0.99,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_domain;

    fn scorer() -> ViceScorer {
        ViceScorer::from_map(HashMap::from([
            ("5".to_string(), vec!["terror".to_string()]),
            ("3".to_string(), vec!["casino".to_string()]),
            ("1".to_string(), vec!["dating".to_string()]),
        ]))
    }

    #[test]
    fn picks_highest_matching_severity() {
        let cases = [
            ("terror-camp.com", 5),
            ("play-casino.io", 3),
            ("speed-dating.net", 1),
            ("flowers.store", 0),
        ];
        let scorer = scorer();
        for (domain, expected) in cases {
            let result = scorer.score(&normalize_domain(domain));
            assert_eq!(result.score, expected, "domain {domain}");
        }
    }

    #[test]
    fn confidence_tracks_severity() {
        let scorer = scorer();
        assert_eq!(scorer.score(&normalize_domain("terror.io")).confidence, 0.95);
        assert_eq!(
            scorer.score(&normalize_domain("casino.io")).confidence,
            0.80
        );
        assert_eq!(
            scorer.score(&normalize_domain("dating.io")).confidence,
            0.60
        );
        assert_eq!(
            scorer.score(&normalize_domain("flowers.io")).confidence,
            0.99
        );
    }

    #[test]
    fn categories_are_sorted_and_deduped() {
        let scorer = ViceScorer::from_map(HashMap::from([(
            "3".to_string(),
            vec![
                "poker".to_string(),
                "casino".to_string(),
                "casino".to_string(),
            ],
        )]));
        let result = scorer.score(&normalize_domain("casino-poker.io"));
        assert_eq!(result.categories, vec!["casino", "poker"]);
    }

    #[test]
    fn substring_hits_inside_larger_words_still_match() {
        let scorer = scorer();
        // "dating" hides inside "validating" after sanitization
        let result = scorer.score(&normalize_domain("validating.io"));
        assert_eq!(result.score, 1);
    }

    #[test]
    fn term_lists_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vice.json");
        std::fs::write(&path, r#"{"5": ["terror"], "2": ["Pay-Day Loan", ""]}"#).unwrap();

        let scorer = ViceScorer::from_path(&path).unwrap();
        scorer.validate().unwrap();
        assert_eq!(scorer.score(&normalize_domain("terror.io")).score, 5);
        assert_eq!(scorer.score(&normalize_domain("paydayloan.io")).score, 2);
    }

    #[test]
    fn empty_scorer_fails_validation() {
        let scorer = ViceScorer::from_map(HashMap::new());
        assert!(scorer.validate().is_err());
        assert!(ViceScorer::from_map(HashMap::from([(
            "2".to_string(),
            vec!["x".to_string()]
        )]))
        .validate()
        .is_ok());
    }
}
