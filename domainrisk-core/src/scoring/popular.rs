// domainrisk-core/src/scoring/popular.rs

use std::collections::HashSet;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use tracing::info;

use crate::normalize::sanitize_label;
use crate::repositories::sqlite::MarkRepository;
use crate::Error;

static POPULAR_TOKENS: Lazy<RwLock<HashSet<String>>> =
    Lazy::new(|| RwLock::new(baseline_popular_tokens()));

/// Replace the process-wide popular token set. The built-in baseline is
/// merged on every swap so hot-reloading never drops well-known brands.
pub fn set_popular_tokens<I, S>(tokens: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut combined = baseline_popular_tokens();
    for token in tokens {
        let normalized = sanitize_label(token.as_ref());
        if !normalized.is_empty() {
            combined.insert(normalized);
        }
    }
    let mut guard = POPULAR_TOKENS.write().expect("popular token lock");
    *guard = combined;
}

/// Whether the supplied token is recognised as a popular brand or public
/// figure that should trigger heightened review.
pub fn is_popular_token(token: &str) -> bool {
    let normalized = sanitize_label(token);
    if normalized.is_empty() {
        return false;
    }
    POPULAR_TOKENS
        .read()
        .expect("popular token lock")
        .contains(&normalized)
}

/// Hydrate the in-memory set from the persisted popular mark table.
pub async fn load_popular_tokens_from_store(
    marks: &MarkRepository,
    limit: i64,
) -> Result<usize, Error> {
    let rows = marks.list_popular_marks(limit).await?;
    let count = rows.len();
    set_popular_tokens(rows.iter().map(|row| row.normalized.as_str()));
    info!(tokens = count, "popular token set hydrated from store");
    Ok(count)
}

/// Aggregate popular marks from the marks table, persist the refreshed
/// aggregate, and swap the in-memory set.
pub async fn load_popular_tokens(
    marks: &MarkRepository,
    limit: i64,
    min_count: i64,
) -> Result<usize, Error> {
    let popular = marks.aggregate_popular_marks(limit, min_count).await?;
    marks.replace_popular_marks(&popular).await?;
    let count = popular.len();
    set_popular_tokens(popular.iter().map(|row| row.normalized.as_str()));
    info!(tokens = count, min_count, "popular token set rebuilt");
    Ok(count)
}

fn baseline_popular_tokens() -> HashSet<String> {
    [
        "amazon",
        "meta",
        "facebook",
        "google",
        "youtube",
        "instagram",
        "twitter",
        "tesla",
        "microsoft",
        "apple",
        "netflix",
        "paypal",
        "uber",
        "lyft",
        "salesforce",
        "nike",
        "adidas",
        "cocacola",
        "pepsi",
        "tiktok",
        "snapchat",
        "beyonce",
        "taylor",
        "swift",
        "kanye",
        "elon",
        "rihanna",
        "drake",
        "madonna",
        "oprah",
        "zuckerberg",
        "musk",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_survives_every_swap() {
        set_popular_tokens(["Custom Brand"]);
        assert!(is_popular_token("custombrand"));
        assert!(is_popular_token("amazon"));

        // swapping with an empty set restores just the baseline
        set_popular_tokens(Vec::<String>::new());
        assert!(is_popular_token("amazon"));
        assert!(is_popular_token("tesla"));
    }

    #[test]
    fn tokens_are_sanitized_before_lookup() {
        assert!(is_popular_token("Coca-Cola"));
        assert!(!is_popular_token(""));
        assert!(!is_popular_token("---"));
    }
}
