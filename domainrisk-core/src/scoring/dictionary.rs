// domainrisk-core/src/scoring/dictionary.rs

use std::collections::HashSet;

use once_cell::sync::Lazy;

// Compact list of everyday English words that also show up as registered
// marks. An exact-match hit on one of these is weak evidence on its own.
static COMMON_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "able", "account", "act", "air", "alpha", "anchor", "angel", "apex", "aqua", "arc",
        "atlas", "balance", "base", "beacon", "bear", "bell", "best", "bloom", "blue", "bold",
        "bolt", "bridge", "bright", "castle", "center", "charm", "city", "clear", "coast",
        "compass", "core", "crown", "crystal", "dawn", "delta", "dream", "eagle", "earth",
        "echo", "edge", "ember", "falcon", "field", "fire", "first", "flow", "forest", "fox",
        "fresh", "garden", "gate", "gold", "grace", "grand", "green", "grove", "harbor",
        "haven", "heart", "honor", "horizon", "iron", "island", "ivory", "jade", "key",
        "king", "light", "lion", "lotus", "lucky", "luna", "master", "meadow", "mint",
        "moon", "mountain", "nest", "noble", "north", "nova", "oak", "ocean", "orbit",
        "peak", "pearl", "pilot", "pioneer", "point", "prime", "pulse", "pure", "quest",
        "rain", "rapid", "raven", "ridge", "rise", "river", "rock", "royal", "sage", "salt",
        "sky", "smart", "solar", "spark", "spring", "star", "stone", "storm", "summit",
        "sun", "swift", "terra", "tide", "tiger", "torch", "trail", "true", "trust",
        "union", "valley", "vista", "wave", "west", "wild", "willow", "wind", "wolf",
    ]
    .into_iter()
    .collect()
});

/// Heuristic predicate for "ordinary dictionary word". Words absent from
/// the embedded list read as not common.
pub fn is_common_word(token: &str) -> bool {
    COMMON_WORDS.contains(token.trim().to_lowercase().as_str())
}
