// domainrisk-core/src/config.rs

use std::time::Duration;

/// Tunables recognized by the evaluation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Top-N popularity-ranked marks loaded into the trademark index.
    pub marks_limit: i64,

    /// Batch size for domain enumeration; clamped to [1, 5000] at run time.
    pub chunk_size: i64,

    /// Minimum occurrences for a token to enter the popular set.
    pub popular_min_count: i64,

    /// Minimum sale price to include in the commercial fuzzy index.
    pub commercial_min_price: f64,

    /// AI retry policy: attempt count and exponential backoff bounds.
    pub ai_max_retries: u32,
    pub ai_initial_backoff: Duration,
    pub ai_max_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            marks_limit: 500_000,
            chunk_size: 1000,
            popular_min_count: 2,
            commercial_min_price: 10_000.0,
            ai_max_retries: 3,
            ai_initial_backoff: Duration::from_secs(2),
            ai_max_backoff: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Self {
        let mut cfg = EngineConfig::default();
        if let Ok(limit) = std::env::var("MARKS_LIMIT") {
            if let Ok(v) = limit.trim().parse::<i64>() {
                if v > 0 {
                    cfg.marks_limit = v;
                }
            }
        }
        if let Ok(min_count) = std::env::var("POPULAR_MARK_MIN_COUNT") {
            if let Ok(v) = min_count.trim().parse::<i64>() {
                if v > 0 {
                    cfg.popular_min_count = v;
                }
            }
        }
        if let Ok(price) = std::env::var("COMMERCIAL_MIN_PRICE") {
            if let Ok(v) = price.trim().parse::<f64>() {
                if v > 0.0 {
                    cfg.commercial_min_price = v;
                }
            }
        }
        cfg
    }
}
