// domainrisk-ai/src/chain.rs

use std::sync::Arc;

use async_trait::async_trait;

use domainrisk_common::Error;

use crate::traits::{Decision, ExplanationInput, Explainer};

/// Tries the primary explainer first and falls back when it is
/// unavailable or produces an unusable response.
struct ExplainerChain {
    primary: Arc<dyn Explainer>,
    fallback: Arc<dyn Explainer>,
}

/// Compose two explainers into a primary-then-fallback chain. A missing
/// side collapses to the other.
pub fn with_fallback(
    primary: Option<Arc<dyn Explainer>>,
    fallback: Option<Arc<dyn Explainer>>,
) -> Option<Arc<dyn Explainer>> {
    match (primary, fallback) {
        (Some(primary), Some(fallback)) => Some(Arc::new(ExplainerChain { primary, fallback })),
        (Some(primary), None) => Some(primary),
        (None, fallback) => fallback,
    }
}

#[async_trait]
impl Explainer for ExplainerChain {
    fn enabled(&self) -> bool {
        self.primary.enabled() || self.fallback.enabled()
    }

    async fn explain(&self, input: &ExplanationInput) -> Result<Decision, Error> {
        if self.primary.enabled() {
            if let Ok(decision) = self.primary.explain(input).await {
                if !decision.narrative.trim().is_empty() && decision.recommendation.is_some() {
                    return Ok(decision);
                }
            }
        }
        if self.fallback.enabled() {
            return self.fallback.explain(input).await;
        }
        Err(Error::AiDisabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainrisk_common::models::Recommendation;

    struct StubExplainer {
        enabled: bool,
        decision: Option<Decision>,
    }

    #[async_trait]
    impl Explainer for StubExplainer {
        fn enabled(&self) -> bool {
            self.enabled
        }

        async fn explain(&self, _input: &ExplanationInput) -> Result<Decision, Error> {
            match &self.decision {
                Some(d) => Ok(d.clone()),
                None => Err(Error::UpstreamStatus {
                    status: 500,
                    body: "boom".to_string(),
                }),
            }
        }
    }

    fn usable(narrative: &str) -> Decision {
        Decision {
            narrative: narrative.to_string(),
            recommendation: Some(Recommendation::Allow),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn primary_wins_when_usable() {
        let chain = with_fallback(
            Some(Arc::new(StubExplainer {
                enabled: true,
                decision: Some(usable("primary")),
            })),
            Some(Arc::new(StubExplainer {
                enabled: true,
                decision: Some(usable("fallback")),
            })),
        )
        .unwrap();

        let decision = chain.explain(&ExplanationInput::default()).await.unwrap();
        assert_eq!(decision.narrative, "primary");
    }

    #[tokio::test]
    async fn fallback_covers_primary_failure() {
        let chain = with_fallback(
            Some(Arc::new(StubExplainer {
                enabled: true,
                decision: None,
            })),
            Some(Arc::new(StubExplainer {
                enabled: true,
                decision: Some(usable("fallback")),
            })),
        )
        .unwrap();

        let decision = chain.explain(&ExplanationInput::default()).await.unwrap();
        assert_eq!(decision.narrative, "fallback");
    }

    #[tokio::test]
    async fn fallback_covers_empty_narrative() {
        let chain = with_fallback(
            Some(Arc::new(StubExplainer {
                enabled: true,
                decision: Some(Decision {
                    narrative: "  ".to_string(),
                    recommendation: Some(Recommendation::Allow),
                    ..Default::default()
                }),
            })),
            Some(Arc::new(StubExplainer {
                enabled: true,
                decision: Some(usable("fallback")),
            })),
        )
        .unwrap();

        let decision = chain.explain(&ExplanationInput::default()).await.unwrap();
        assert_eq!(decision.narrative, "fallback");
    }

    #[tokio::test]
    async fn everything_disabled_errors() {
        let chain = with_fallback(
            Some(Arc::new(StubExplainer {
                enabled: false,
                decision: None,
            })),
            Some(Arc::new(StubExplainer {
                enabled: false,
                decision: None,
            })),
        )
        .unwrap();

        assert!(!chain.enabled());
        assert!(matches!(
            chain.explain(&ExplanationInput::default()).await,
            Err(Error::AiDisabled)
        ));
    }

    #[test]
    fn missing_sides_collapse() {
        assert!(with_fallback(None, None).is_none());
        let only: Arc<dyn Explainer> = Arc::new(StubExplainer {
            enabled: true,
            decision: Some(usable("x")),
        });
        assert!(with_fallback(Some(only.clone()), None).is_some());
        assert!(with_fallback(None, Some(only)).is_some());
    }
}
