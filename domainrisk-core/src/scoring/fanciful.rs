// domainrisk-core/src/scoring/fanciful.rs

use std::collections::HashSet;

use crate::normalize::clean_token;

/// Decides whether a live USPTO mark should be treated as fanciful when
/// no local index entry exists for it.
pub struct FancifulDecider {
    seeds: HashSet<String>,
}

impl FancifulDecider {
    pub fn new(seeds: HashSet<String>) -> Self {
        FancifulDecider { seeds }
    }

    /// Seed membership wins; otherwise a longer mark registered across
    /// multiple classes is presumed coined.
    pub fn decide(&self, mark_normalized: &str, classes: &[String]) -> bool {
        let key = clean_token(mark_normalized);
        if self.seeds.contains(&key) {
            return true;
        }
        mark_normalized.len() >= 6 && classes.len() >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_listed_marks_are_fanciful() {
        let decider = FancifulDecider::new(HashSet::from(["google".to_string()]));
        assert!(decider.decide("Goo-gle", &[]));
    }

    #[test]
    fn long_multi_class_marks_are_fanciful() {
        let decider = FancifulDecider::new(HashSet::new());
        let classes = vec!["009".to_string(), "042".to_string()];
        assert!(decider.decide("zyxtraq", &classes));
        assert!(!decider.decide("zyx", &classes));
        assert!(!decider.decide("zyxtraq", &["009".to_string()]));
    }
}
