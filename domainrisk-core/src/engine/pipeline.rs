// domainrisk-core/src/engine/pipeline.rs
//
// Per-domain orchestration: normalize, score, resolve against USPTO,
// apply the commercial override, and gather the AI narrative.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use domainrisk_ai::{Decision, ExplanationInput, Explainer};
use domainrisk_common::models::{
    BatchDomain, Evaluation, Recommendation, TrademarkResult, TrademarkType, ViceResult,
};

use crate::commercial::CommercialMatcher;
use crate::config::EngineConfig;
use crate::normalize::{clean_token, normalize_domain, top_level_label, DomainProfile};
use crate::scoring::popular::is_popular_token;
use crate::scoring::{combine_recommendation, FancifulDecider, TrademarkScorer, ViceScorer};
use crate::uspto::{LookupResult, UsptoClient};
use crate::Error;

const COMMERCIAL_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Everything a worker needs to evaluate one domain. Shared immutably
/// across the pool; the USPTO cache is the one mutable cell.
pub(crate) struct WorkerContext {
    pub scorer: Arc<TrademarkScorer>,
    pub fanciful: Arc<FancifulDecider>,
    pub vice: Arc<ViceScorer>,
    pub explainer: Option<Arc<dyn Explainer>>,
    pub uspto: Option<Arc<UsptoClient>>,
    pub uspto_cache: Arc<Mutex<HashMap<String, LookupResult>>>,
    pub commercial: Option<Arc<CommercialMatcher>>,
    pub config: EngineConfig,
    pub marks_count: usize,
    pub total_domains: i64,
    pub cancel_rx: watch::Receiver<bool>,
}

pub(crate) struct DomainOutcome {
    pub evaluation: Evaluation,
    pub lookup_duration: Duration,
    pub ai_duration: Duration,
    pub total_duration: Duration,
}

pub(crate) async fn evaluate_domain(
    ctx: &WorkerContext,
    task: &BatchDomain,
) -> Result<DomainOutcome, Error> {
    let domain = task.domain.trim();
    if domain.is_empty() {
        return Err(Error::Parse("empty domain value".to_string()));
    }
    let normalized_key = if task.domain_normalized.trim().is_empty() {
        domain.to_lowercase()
    } else {
        task.domain_normalized.trim().to_string()
    };

    let started = Instant::now();
    let profile = normalize_domain(domain);
    let fallback_tm = ctx.scorer.score(&profile);

    let mut lookup_duration = Duration::ZERO;
    let mut lookup_result = LookupResult::default();
    let mut lookup_valid = false;
    if ctx.uspto.is_some() {
        let lookup_started = Instant::now();
        let mut cache = ctx.uspto_cache.lock().await;
        (lookup_result, lookup_valid) = lookup_uspto(ctx, &profile.brand_token, &mut cache).await;
        lookup_duration = lookup_started.elapsed();
    }

    let (mut trademark, close_matches) =
        resolve_trademark(ctx, &profile, lookup_valid, &lookup_result, fallback_tm);
    let mut vice = ctx.vice.score(&profile);
    let mut overall = combine_recommendation(&trademark, &vice);

    let mut commercial_override = false;
    let mut commercial_source = String::new();
    let mut commercial_similarity = 0.0;
    let mut commercial_price = 0.0;

    if let Some(matcher) = &ctx.commercial {
        match matcher.best_match(&profile.sld).await {
            Ok(Some(best)) if best.similarity >= COMMERCIAL_SIMILARITY_THRESHOLD => {
                commercial_similarity = best.similarity;
                commercial_price = best.price;
                commercial_source = format!("sale ${:.0}", best.price);
                if vice.score <= 2 && trademark.score <= 3 {
                    commercial_override = true;
                    overall.recommendation = overall.recommendation.downgrade();
                }
            }
            Ok(_) => {}
            Err(err) => debug!(domain, error = %err, "commercial lookup failed"),
        }
    }

    let ai_started = Instant::now();
    let decision = generate_decision(
        ctx,
        &profile,
        domain,
        &close_matches,
        &trademark,
        &vice,
        &overall,
        commercial_override,
        &commercial_source,
        commercial_similarity,
        commercial_price,
    )
    .await?;
    let ai_duration = ai_started.elapsed();

    if let Some(score) = decision.trademark_score {
        trademark.score = score.clamp(0, 5);
    }
    if let Some(score) = decision.vice_score {
        vice.score = score.clamp(0, 5);
    }

    overall = combine_recommendation(&trademark, &vice);
    if commercial_override {
        overall.recommendation = overall.recommendation.downgrade();
    }
    if let Some(rec) = decision.recommendation {
        overall.recommendation = rec;
    }
    if let Some(confidence) = decision.confidence {
        let confidence = confidence.clamp(0.0, 1.0);
        overall.confidence = confidence;
        trademark.confidence = confidence;
        vice.confidence = confidence;
    }

    let mut evaluation = Evaluation {
        domain: domain.to_string(),
        domain_normalized: normalized_key,
        trademark_score: trademark.score,
        trademark_type: trademark.mark_type,
        matched_trademark: trademark.matched_trademark.clone(),
        trademark_confidence: trademark.confidence,
        vice_score: vice.score,
        vice_confidence: vice.confidence,
        overall_recommendation: overall.recommendation,
        processing_time_ms: started.elapsed().as_millis() as i64,
        explanation: decision.narrative.trim().to_string(),
        commercial_override,
        commercial_source,
        commercial_similarity,
        created_at: Utc::now(),
        ..Default::default()
    };
    evaluation.set_vice_categories(&vice.categories);

    Ok(DomainOutcome {
        evaluation,
        lookup_duration,
        ai_duration,
        total_duration: started.elapsed(),
    })
}

/// Read-through lookup against the per-job cache. A failed lookup is
/// cached as unchecked so the job does not hammer a failing upstream.
async fn lookup_uspto(
    ctx: &WorkerContext,
    brand_token: &str,
    cache: &mut HashMap<String, LookupResult>,
) -> (LookupResult, bool) {
    let Some(client) = &ctx.uspto else {
        return (LookupResult::default(), false);
    };
    let key = brand_token.trim().to_lowercase();
    if key.is_empty() {
        return (LookupResult::default(), false);
    }
    if let Some(cached) = cache.get(&key) {
        return (cached.clone(), cached.checked);
    }
    match client.lookup_exact(&key).await {
        Ok(result) => {
            let valid = result.checked;
            cache.insert(key, result.clone());
            (result, valid)
        }
        Err(err) => {
            warn!(term = %key, error = %err, "uspto lookup failed");
            cache.insert(
                key.clone(),
                LookupResult {
                    term: key,
                    checked: false,
                    ..Default::default()
                },
            );
            (LookupResult::default(), false)
        }
    }
}

/// Pick the authoritative trademark result: a local index hit wins, then
/// live USPTO exact matches classified on the fly. Every exact and
/// similar mark string feeds the close-matches list.
fn resolve_trademark(
    ctx: &WorkerContext,
    profile: &DomainProfile,
    has_lookup: bool,
    lookup: &LookupResult,
    fallback: TrademarkResult,
) -> (TrademarkResult, Vec<String>) {
    let mut close_matches: Vec<String> = Vec::new();
    let sld_token = clean_token(&profile.sld);

    if fallback.score > 0 && !fallback.matched_trademark.is_empty() {
        close_matches.push(fallback.matched_trademark.clone());
        return (fallback, unique_strings(close_matches));
    }

    if has_lookup && lookup.checked {
        for exact in &lookup.exact_matches {
            if exact.mark.is_empty() {
                continue;
            }
            close_matches.push(exact.mark.clone());
            if clean_token(&exact.mark) != sld_token {
                continue;
            }
            let result = if ctx.fanciful.decide(&exact.mark, &exact.classes) {
                TrademarkResult {
                    score: 5,
                    mark_type: TrademarkType::Fanciful,
                    matched_trademark: exact.mark.clone(),
                    confidence: 0.98,
                }
            } else if is_popular_token(&exact.mark) {
                TrademarkResult {
                    score: 2,
                    mark_type: TrademarkType::Popular,
                    matched_trademark: exact.mark.clone(),
                    confidence: 0.75,
                }
            } else {
                TrademarkResult {
                    score: 0,
                    mark_type: TrademarkType::Generic,
                    matched_trademark: exact.mark.clone(),
                    confidence: 0.4,
                }
            };
            return (result, unique_strings(close_matches));
        }
        for similar in &lookup.similar {
            if !similar.mark.is_empty() {
                close_matches.push(similar.mark.clone());
            }
        }
    }

    (
        TrademarkResult {
            score: 0,
            mark_type: TrademarkType::None,
            matched_trademark: String::new(),
            confidence: 0.4,
        },
        unique_strings(close_matches),
    )
}

#[allow(clippy::too_many_arguments)]
async fn generate_decision(
    ctx: &WorkerContext,
    profile: &DomainProfile,
    domain: &str,
    close_matches: &[String],
    trademark: &TrademarkResult,
    vice: &ViceResult,
    overall: &domainrisk_common::models::OverallResult,
    commercial_override: bool,
    commercial_source: &str,
    commercial_similarity: f64,
    commercial_price: f64,
) -> Result<Decision, Error> {
    let fallback = Decision {
        narrative: build_fallback_narrative(overall.recommendation),
        ..Default::default()
    };

    let Some(explainer) = &ctx.explainer else {
        return Ok(fallback);
    };
    if !explainer.enabled() {
        return Ok(fallback);
    }

    let tokens = collect_domain_tokens(profile);
    let input = ExplanationInput {
        domain: domain.to_string(),
        trademark: trademark.clone(),
        vice: vice.clone(),
        overall: Some(overall.clone()),
        marks_count: ctx.marks_count,
        domains_count: ctx.total_domains,
        close_matches: close_matches.to_vec(),
        second_level: profile.sld.clone(),
        top_level: top_level_label(&profile.host),
        has_substring_alerts: has_substring_alerts(&vice.categories, &profile.sld, &tokens),
        domain_tokens: tokens,
        vice_terms: vice.categories.clone(),
        recommendation: Some(overall.recommendation),
        allow_override: true,
        commercial_override,
        commercial_source: commercial_source.to_string(),
        commercial_similarity,
        commercial_price,
    };

    match call_ai_with_retry(ctx, explainer, &input).await {
        Ok(mut decision) => {
            if decision.narrative.trim().is_empty() {
                decision.narrative = fallback.narrative;
            }
            Ok(decision)
        }
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Err(err) => {
            warn!(domain, error = %err, "ai explainer unavailable; falling back to heuristic output");
            Ok(fallback)
        }
    }
}

/// Retry transient failures with capped exponential backoff. Permanent
/// failures bail immediately; cancellation aborts the wait.
async fn call_ai_with_retry(
    ctx: &WorkerContext,
    explainer: &Arc<dyn Explainer>,
    input: &ExplanationInput,
) -> Result<Decision, Error> {
    let mut delay = ctx.config.ai_initial_backoff;
    let mut cancel_rx = ctx.cancel_rx.clone();
    let mut last_err = Error::AiDisabled;

    for attempt in 0..ctx.config.ai_max_retries {
        match explainer.explain(input).await {
            Ok(decision) => return Ok(decision),
            Err(err) => {
                if *cancel_rx.borrow() {
                    return Err(Error::Cancelled);
                }
                let transient = err.is_transient();
                last_err = err;
                if !transient || attempt + 1 == ctx.config.ai_max_retries {
                    break;
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel_rx.changed() => return Err(Error::Cancelled),
        }
        delay = (delay * 2).min(ctx.config.ai_max_backoff);
    }

    Err(last_err)
}

/// Deterministic narrative used whenever the AI step cannot run.
pub fn build_fallback_narrative(recommendation: Recommendation) -> String {
    match recommendation {
        Recommendation::Block => {
            "Heuristic risk scoring recommends BLOCK; AI explanation is temporarily unavailable."
        }
        Recommendation::Review => {
            "Heuristic signals recommend REVIEW; AI narrative waiting for retry."
        }
        Recommendation::AllowWithCaution => {
            "Heuristic evaluation suggests ALLOW WITH CAUTION; AI summary could not be retrieved."
        }
        Recommendation::Allow => {
            "Heuristic evaluation completed; AI explanation unavailable at this time."
        }
    }
    .to_string()
}

fn collect_domain_tokens(profile: &DomainProfile) -> Vec<String> {
    let mut tokens: Vec<String> = std::iter::once(profile.brand_token.as_str())
        .chain(std::iter::once(profile.sld.as_str()))
        .chain(profile.tokens.iter().map(String::as_str))
        .chain(profile.alt_splits.iter().map(String::as_str))
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

/// A vice term hiding inside a larger word (present in the core but not
/// among the tokens) is a possible false positive worth flagging.
fn has_substring_alerts(terms: &[String], core: &str, tokens: &[String]) -> bool {
    if terms.is_empty() {
        return false;
    }
    let lower_core = core.trim().to_lowercase();
    terms.iter().any(|term| {
        let term = term.trim().to_lowercase();
        !term.is_empty() && !tokens.contains(&term) && lower_core.contains(&term)
    })
}

fn unique_strings(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_narratives_are_keyed_by_recommendation() {
        assert!(build_fallback_narrative(Recommendation::Block).contains("BLOCK"));
        assert!(build_fallback_narrative(Recommendation::Review).contains("REVIEW"));
        assert!(
            build_fallback_narrative(Recommendation::AllowWithCaution).contains("ALLOW WITH CAUTION")
        );
        let allow = build_fallback_narrative(Recommendation::Allow);
        assert!(!allow.contains("BLOCK") && !allow.contains("REVIEW"));
    }

    #[test]
    fn substring_alerts_only_fire_inside_larger_words() {
        let tokens = vec!["validating".to_string()];
        assert!(has_substring_alerts(
            &["dating".to_string()],
            "validating",
            &tokens
        ));

        let tokens = vec!["speed".to_string(), "dating".to_string()];
        assert!(!has_substring_alerts(
            &["dating".to_string()],
            "speed-dating",
            &tokens
        ));

        assert!(!has_substring_alerts(&[], "anything", &[]));
    }

    #[test]
    fn domain_tokens_are_sorted_and_unique() {
        let profile = normalize_domain("speed-dating.net");
        let tokens = collect_domain_tokens(&profile);
        assert_eq!(tokens, vec!["dating", "speed", "speed-dating", "speeddating"]);
    }

    #[test]
    fn unique_strings_dedupes_case_insensitively() {
        let out = unique_strings(vec![
            "Acme".to_string(),
            "acme".to_string(),
            " ".to_string(),
            "Beta".to_string(),
        ]);
        assert_eq!(out, vec!["Acme", "Beta"]);
    }
}
