// domainrisk-common/src/models/scoring.rs

use serde::{Deserialize, Serialize};

use crate::Error;

/// Final stance for a domain, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "BLOCK")]
    Block,
    #[serde(rename = "REVIEW")]
    Review,
    #[serde(rename = "ALLOW_WITH_CAUTION")]
    AllowWithCaution,
    #[serde(rename = "ALLOW")]
    Allow,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Block => "BLOCK",
            Recommendation::Review => "REVIEW",
            Recommendation::AllowWithCaution => "ALLOW_WITH_CAUTION",
            Recommendation::Allow => "ALLOW",
        }
    }

    /// One-step severity reduction applied by the commercial override.
    /// The two lower tiers are untouched.
    pub fn downgrade(&self) -> Recommendation {
        match self {
            Recommendation::Block => Recommendation::Review,
            Recommendation::Review => Recommendation::AllowWithCaution,
            other => *other,
        }
    }
}

impl std::str::FromStr for Recommendation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BLOCK" => Ok(Recommendation::Block),
            "REVIEW" => Ok(Recommendation::Review),
            "ALLOW_WITH_CAUTION" | "ALLOWWITHCAUTION" => Ok(Recommendation::AllowWithCaution),
            "ALLOW" => Ok(Recommendation::Allow),
            other => Err(Error::Parse(format!("unknown recommendation: {other}"))),
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a matched trademark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrademarkType {
    None,
    Generic,
    Popular,
    Fanciful,
}

impl TrademarkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrademarkType::None => "none",
            TrademarkType::Generic => "generic",
            TrademarkType::Popular => "popular",
            TrademarkType::Fanciful => "fanciful",
        }
    }
}

impl std::str::FromStr for TrademarkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(TrademarkType::None),
            "generic" => Ok(TrademarkType::Generic),
            "popular" => Ok(TrademarkType::Popular),
            "fanciful" => Ok(TrademarkType::Fanciful),
            other => Err(Error::Parse(format!("unknown trademark type: {other}"))),
        }
    }
}

impl std::fmt::Display for TrademarkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a trademark evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrademarkResult {
    pub score: i32,
    #[serde(rename = "type")]
    pub mark_type: TrademarkType,
    pub matched_trademark: String,
    pub confidence: f64,
}

impl Default for TrademarkResult {
    fn default() -> Self {
        TrademarkResult {
            score: 0,
            mark_type: TrademarkType::None,
            matched_trademark: String::new(),
            confidence: 0.2,
        }
    }
}

/// Outcome of vice term detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViceResult {
    pub score: i32,
    pub categories: Vec<String>,
    pub confidence: f64,
}

impl Default for ViceResult {
    fn default() -> Self {
        ViceResult {
            score: 0,
            categories: Vec::new(),
            confidence: 0.99,
        }
    }
}

/// Merged trademark + vice outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallResult {
    #[serde(rename = "overall_recommendation")]
    pub recommendation: Recommendation,
    pub confidence: f64,
}
