// domainrisk-core/src/scoring/trademark.rs

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::debug;

use domainrisk_common::models::{Mark, TrademarkResult, TrademarkType};

use crate::normalize::{sanitize_label, DomainProfile};
use crate::scoring::dictionary::is_common_word;
use crate::scoring::popular::is_popular_token;
use crate::Error;

/// Compact index entry; the display form is what surfaces in results.
struct IndexEntry {
    mark: String,
    is_fanciful: bool,
}

/// Exact-match lookup from sanitized SLD to a representative mark.
///
/// Only exact SLD-to-mark matches produce non-zero trademark risk; partial
/// matches, compound subsets, and edit-distance variants stay at zero and
/// are surfaced to the AI explainer through the close-matches list instead.
pub struct TrademarkScorer {
    index: HashMap<String, IndexEntry>,
    seeds: HashSet<String>,
}

impl TrademarkScorer {
    /// Build an index from popularity-ranked marks with seed overrides.
    /// On a sanitized-key collision the first-inserted mark is retained,
    /// keeping construction deterministic.
    pub fn new(marks: &[Mark], seeds: HashSet<String>) -> Self {
        let mut index = HashMap::with_capacity(marks.len());
        for mark in marks {
            let key = sanitize_label(&mark.mark_no_spaces);
            if key.is_empty() {
                continue;
            }
            index.entry(key).or_insert_with(|| IndexEntry {
                mark: mark.mark.clone(),
                is_fanciful: mark.is_fanciful,
            });
        }
        debug!(entries = index.len(), seeds = seeds.len(), "trademark index built");
        TrademarkScorer { index, seeds }
    }

    /// Compute the trademark risk score for the supplied domain profile.
    ///
    /// Classification order is fixed: seed-listed or flagged marks are
    /// fanciful, then popular tokens, then generic. Fanciful wins even
    /// when the token is also in the popular set.
    pub fn score(&self, profile: &DomainProfile) -> TrademarkResult {
        let sld = sanitize_label(&profile.sld);
        if sld.is_empty() {
            return TrademarkResult::default();
        }

        let Some(entry) = self.index.get(&sld) else {
            return TrademarkResult::default();
        };

        let is_common = is_common_word(&sld);
        match self.classify(&sld, entry) {
            TrademarkType::Fanciful => {
                if is_common {
                    result(2, TrademarkType::Generic, &entry.mark, 0.6)
                } else {
                    result(5, TrademarkType::Fanciful, &entry.mark, 1.0)
                }
            }
            TrademarkType::Popular => {
                if is_common {
                    result(2, TrademarkType::Popular, &entry.mark, 0.75)
                } else {
                    result(3, TrademarkType::Popular, &entry.mark, 0.9)
                }
            }
            _ => {
                if is_common {
                    result(2, TrademarkType::Generic, &entry.mark, 0.6)
                } else {
                    result(0, TrademarkType::Generic, &entry.mark, 0.4)
                }
            }
        }
    }

    fn classify(&self, key: &str, entry: &IndexEntry) -> TrademarkType {
        if self.seeds.contains(key) || entry.is_fanciful {
            return TrademarkType::Fanciful;
        }
        if is_popular_token(key) {
            return TrademarkType::Popular;
        }
        TrademarkType::Generic
    }
}

fn result(score: i32, mark_type: TrademarkType, matched: &str, confidence: f64) -> TrademarkResult {
    TrademarkResult {
        score,
        mark_type,
        matched_trademark: matched.to_string(),
        confidence,
    }
}

/// Load the known-fanciful seed list: a JSON array of tokens. An empty
/// path yields an empty set.
pub fn load_seeds(path: Option<&Path>) -> Result<HashSet<String>, Error> {
    let Some(path) = path else {
        return Ok(HashSet::new());
    };
    let data = std::fs::read_to_string(path)?;
    let entries: Vec<String> = serde_json::from_str(&data)?;
    Ok(entries
        .iter()
        .map(|entry| sanitize_label(entry))
        .filter(|entry| !entry.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_domain;

    fn mark(serial: &str, display: &str, no_spaces: &str, fanciful: bool) -> Mark {
        Mark {
            serial: serial.to_string(),
            mark: display.to_string(),
            mark_no_spaces: no_spaces.to_string(),
            is_fanciful: fanciful,
            ..Default::default()
        }
    }

    fn scorer() -> TrademarkScorer {
        let marks = vec![
            mark("1", "GOOGLE", "google", true),
            mark("2", "Amazon", "amazon", false),
            mark("3", "Master", "master", false),
        ];
        TrademarkScorer::new(&marks, HashSet::from(["google".to_string()]))
    }

    #[test]
    fn exact_fanciful_scores_five() {
        let result = scorer().score(&normalize_domain("https://google.store"));
        assert_eq!(result.score, 5);
        assert_eq!(result.mark_type, TrademarkType::Fanciful);
        assert_eq!(result.matched_trademark, "GOOGLE");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn fanciful_beats_popular_set_membership() {
        // "google" sits in the popular baseline too; the seed listing must
        // still classify it fanciful.
        let result = scorer().score(&normalize_domain("google.com"));
        assert_eq!(result.mark_type, TrademarkType::Fanciful);
        assert_eq!(result.score, 5);
    }

    #[test]
    fn exact_popular_scores_three() {
        let result = scorer().score(&normalize_domain("amazon.io"));
        assert_eq!(result.score, 3);
        assert_eq!(result.mark_type, TrademarkType::Popular);
        assert_eq!(result.matched_trademark, "Amazon");
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn generic_dictionary_word_scores_two() {
        let result = scorer().score(&normalize_domain("master.ai"));
        assert_eq!(result.score, 2);
        assert_eq!(result.mark_type, TrademarkType::Generic);
        assert_eq!(result.matched_trademark, "Master");
        assert_eq!(result.confidence, 0.6);
    }

    #[test]
    fn near_variants_are_ignored() {
        let result = scorer().score(&normalize_domain("googl.store"));
        assert_eq!(result.score, 0);
        assert_eq!(result.mark_type, TrademarkType::None);
        assert_eq!(result.matched_trademark, "");
    }

    #[test]
    fn compound_supersets_are_ignored() {
        let result = scorer().score(&normalize_domain("amazonmarket.shop"));
        assert_eq!(result.score, 0);
        assert_eq!(result.mark_type, TrademarkType::None);
    }

    #[test]
    fn generic_non_dictionary_match_scores_zero() {
        let marks = vec![mark("9", "Qwyzzle", "qwyzzle", false)];
        let scorer = TrademarkScorer::new(&marks, HashSet::new());
        let result = scorer.score(&normalize_domain("qwyzzle.com"));
        assert_eq!(result.score, 0);
        assert_eq!(result.mark_type, TrademarkType::Generic);
        assert_eq!(result.matched_trademark, "Qwyzzle");
        assert_eq!(result.confidence, 0.4);
    }

    #[test]
    fn first_inserted_mark_wins_on_collision() {
        let marks = vec![
            mark("1", "Acme One", "acme", false),
            mark("2", "Acme Two", "acme", true),
        ];
        let scorer = TrademarkScorer::new(&marks, HashSet::new());
        let result = scorer.score(&normalize_domain("acme.com"));
        assert_eq!(result.matched_trademark, "Acme One");
    }

    #[test]
    fn cctld_adjusted_sld_is_scored() {
        let result = scorer().score(&normalize_domain("amazon.co.uk"));
        assert_eq!(result.score, 3);
        assert_eq!(result.mark_type, TrademarkType::Popular);
    }

    #[test]
    fn seeds_load_from_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.json");
        std::fs::write(&path, r#"["Google", "Coca-Cola", ""]"#).unwrap();

        let seeds = load_seeds(Some(&path)).unwrap();
        assert_eq!(seeds.len(), 2);
        assert!(seeds.contains("google"));
        assert!(seeds.contains("cocacola"));

        assert!(load_seeds(None).unwrap().is_empty());
    }
}
