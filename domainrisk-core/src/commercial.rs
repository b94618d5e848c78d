// domainrisk-core/src/commercial.rs

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use domainrisk_common::models::CommercialSale;

use crate::repositories::sqlite::CommercialRepository;
use crate::Error;

const CANDIDATE_LIMIT: i64 = 75;
const LENGTH_WINDOW: i64 = 2;
const SHORT_CIRCUIT_SIMILARITY: f64 = 0.95;

/// Best historical sale resembling a query SLD.
#[derive(Debug, Clone)]
pub struct CommercialMatch {
    pub sld: String,
    pub price: f64,
    pub similarity: f64,
}

/// Fuzzy lookup of an SLD against historical high-value sales.
///
/// Candidates are pulled with a progressively widening prefix net and a
/// ±2 length window, then ranked by Levenshtein similarity. Results are
/// cached per process.
pub struct CommercialMatcher {
    repo: CommercialRepository,
    cache: Mutex<HashMap<String, Option<CommercialMatch>>>,
}

impl CommercialMatcher {
    pub fn new(repo: CommercialRepository) -> Self {
        CommercialMatcher {
            repo,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn count(&self) -> Result<i64, Error> {
        self.repo.count().await
    }

    /// Best matching sale for the supplied SLD, if any.
    pub async fn best_match(&self, sld: &str) -> Result<Option<CommercialMatch>, Error> {
        let normalized = sld.trim().to_lowercase();
        if normalized.is_empty() {
            return Ok(None);
        }

        if let Some(cached) = self.cache.lock().expect("commercial cache").get(&normalized) {
            return Ok(cached.clone());
        }

        let target_len = normalized.chars().count() as i64;
        let min_len = (target_len - LENGTH_WINDOW).max(1);
        let max_len = target_len + LENGTH_WINDOW;

        let rounds: [Vec<String>; 4] = [
            non_empty(prefix_of(&normalized, 3)),
            non_empty(prefix_of(&normalized, 2)),
            non_empty(prefix_of(&normalized, 1)),
            Vec::new(),
        ];

        let query: Vec<char> = normalized.chars().collect();
        let mut best: Option<CommercialMatch> = None;

        for prefixes in &rounds {
            let candidates = match self
                .repo
                .find_candidates(prefixes, min_len, max_len, target_len, CANDIDATE_LIMIT)
                .await
            {
                Ok(rows) => rows,
                Err(err) => {
                    debug!(error = %err, "commercial candidate query failed");
                    continue;
                }
            };
            for candidate in candidates {
                let sim = similarity(&query, &candidate.normalized.chars().collect::<Vec<_>>());
                if best.as_ref().map_or(true, |b| sim > b.similarity) {
                    best = Some(CommercialMatch {
                        sld: candidate.sld,
                        price: candidate.price,
                        similarity: sim,
                    });
                }
            }
            if best
                .as_ref()
                .is_some_and(|b| b.similarity >= SHORT_CIRCUIT_SIMILARITY)
            {
                break;
            }
        }

        self.cache
            .lock()
            .expect("commercial cache")
            .insert(normalized, best.clone());
        Ok(best)
    }
}

/// Build a sales row from its display SLD and price, deriving the
/// normalized form, prefix, and character length.
pub fn sale_from_parts(sld: &str, price: f64) -> CommercialSale {
    let normalized = sld.trim().to_lowercase();
    CommercialSale {
        id: 0,
        sld: sld.trim().to_string(),
        normalized: normalized.clone(),
        prefix: prefix_of(&normalized, 3),
        length: normalized.chars().count() as i64,
        price,
    }
}

fn prefix_of(value: &str, size: usize) -> String {
    value.chars().take(size).collect()
}

fn non_empty(prefix: String) -> Vec<String> {
    if prefix.is_empty() {
        Vec::new()
    } else {
        vec![prefix]
    }
}

/// `1 − editDistance / max(len)`, clamped to [0, 1].
fn similarity(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dist = levenshtein(a, b) as f64;
    let max_len = a.len().max(b.len()) as f64;
    (1.0 - dist / max_len).clamp(0.0, 1.0)
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let cols = b.len() + 1;
    let mut prev: Vec<usize> = (0..cols).collect();
    let mut current = vec![0usize; cols];

    for (r, &ca) in a.iter().enumerate() {
        current[0] = r + 1;
        for (c, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[c + 1] = (prev[c + 1] + 1)
                .min(current[c] + 1)
                .min(prev[c] + cost);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[cols - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(a: &str, b: &str) -> f64 {
        similarity(
            &a.chars().collect::<Vec<_>>(),
            &b.chars().collect::<Vec<_>>(),
        )
    }

    #[test]
    fn identical_strings_are_fully_similar() {
        assert_eq!(sim("cars", "cars"), 1.0);
        assert_eq!(sim("", ""), 1.0);
    }

    #[test]
    fn single_edit_distance() {
        assert!((sim("cars", "carts") - 0.8).abs() < 1e-9);
        assert!((sim("tesla", "teslas") - (1.0 - 1.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn disjoint_strings_score_low() {
        assert_eq!(sim("abc", ""), 0.0);
        assert!(sim("abcd", "wxyz") < 0.1);
    }

    #[test]
    fn levenshtein_counts_edits_over_chars() {
        let a: Vec<char> = "kitten".chars().collect();
        let b: Vec<char> = "sitting".chars().collect();
        assert_eq!(levenshtein(&a, &b), 3);
    }

    #[test]
    fn sale_rows_derive_prefix_and_length() {
        let sale = sale_from_parts(" Cars ", 120_000.0);
        assert_eq!(sale.normalized, "cars");
        assert_eq!(sale.prefix, "car");
        assert_eq!(sale.length, 4);
        assert_eq!(sale.price, 120_000.0);
    }

    #[test]
    fn short_slds_keep_shorter_prefixes() {
        let sale = sale_from_parts("ab", 15_000.0);
        assert_eq!(sale.prefix, "ab");
    }
}
