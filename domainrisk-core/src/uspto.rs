// domainrisk-core/src/uspto.rs

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use crate::normalize::clean_token;
use crate::Error;

const DEFAULT_BASE_URL: &str = "https://developer.uspto.gov/ibd-api/v1/application/publications";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(12 * 60 * 60);
const DEFAULT_ROWS: u32 = 25;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

/// Drives USPTO client behaviour.
#[derive(Debug, Clone)]
pub struct UsptoConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub rows: u32,
}

impl Default for UsptoConfig {
    fn default() -> Self {
        UsptoConfig {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            rows: DEFAULT_ROWS,
        }
    }
}

impl UsptoConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Self {
        let mut cfg = UsptoConfig::default();
        if let Ok(key) = std::env::var("USPTO_API_KEY") {
            cfg.api_key = key.trim().to_string();
        }
        if let Ok(url) = std::env::var("USPTO_BASE_URL") {
            if !url.trim().is_empty() {
                cfg.base_url = url.trim().to_string();
            }
        }
        if let Ok(timeout) = std::env::var("USPTO_TIMEOUT_SECS") {
            if let Ok(v) = timeout.trim().parse::<u64>() {
                if v > 0 {
                    cfg.timeout = Duration::from_secs(v);
                }
            }
        }
        if let Ok(ttl) = std::env::var("USPTO_CACHE_TTL_SECS") {
            if let Ok(v) = ttl.trim().parse::<u64>() {
                if v > 0 {
                    cfg.cache_ttl = Duration::from_secs(v);
                }
            }
        }
        if let Ok(rows) = std::env::var("USPTO_ROWS") {
            if let Ok(v) = rows.trim().parse::<u32>() {
                if v > 0 {
                    cfg.rows = v;
                }
            }
        }
        cfg
    }
}

/// The subset of USPTO data needed for scoring.
#[derive(Debug, Clone, Default)]
pub struct UsptoMark {
    pub serial_number: String,
    pub registration_number: String,
    pub mark: String,
    pub owner: String,
    pub status: String,
    pub status_code: String,
    pub status_category: String,
    pub classes: Vec<String>,
    pub is_live: bool,
}

/// Exact and similar matches for a queried term. `checked == false`
/// represents a lookup that never completed.
#[derive(Debug, Clone, Default)]
pub struct LookupResult {
    pub term: String,
    pub exact_matches: Vec<UsptoMark>,
    pub similar: Vec<UsptoMark>,
    pub checked: bool,
}

#[derive(Debug)]
struct CacheEntry {
    at: Instant,
    result: LookupResult,
}

/// Time-bounded, TTL-cached USPTO lookup client with a single retry on
/// rate limiting.
#[derive(Debug)]
pub struct UsptoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    rows: u32,
    cache_ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl UsptoClient {
    pub fn new(config: UsptoConfig) -> Result<Self, Error> {
        if config.api_key.trim().is_empty() {
            return Err(Error::MissingCredentials("uspto api key".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(UsptoClient {
            http,
            base_url: config.base_url,
            api_key: config.api_key,
            rows: config.rows,
            cache_ttl: config.cache_ttl,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch USPTO data for the supplied trademark token.
    pub async fn lookup_exact(&self, term: &str) -> Result<LookupResult, Error> {
        let key = term.trim().to_lowercase();
        if key.is_empty() {
            return Ok(LookupResult::default());
        }

        {
            let mut cache = self.cache.lock().expect("uspto cache");
            if let Some(entry) = cache.get(&key) {
                if entry.at.elapsed() < self.cache_ttl {
                    return Ok(entry.result.clone());
                }
                cache.remove(&key);
            }
        }

        let result = self.perform_request(&key).await?;
        self.cache.lock().expect("uspto cache").insert(
            key,
            CacheEntry {
                at: Instant::now(),
                result: result.clone(),
            },
        );
        Ok(result)
    }

    async fn perform_request(&self, term: &str) -> Result<LookupResult, Error> {
        let mut response = self.send_search(term).await?;

        if response.status().as_u16() == 429 {
            // back off and retry once
            debug!(term, "uspto rate limited, retrying after backoff");
            tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
            response = self.send_search(term).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body: body.chars().take(256).collect(),
            });
        }

        let payload: SearchResponse = response.json().await?;
        let clean_term = clean_token(term);
        let mut exact = Vec::new();
        let mut similar = Vec::new();

        for item in payload.results {
            let mark = item.mark_identification.trim().to_string();
            if mark.is_empty() {
                continue;
            }
            let mut record = UsptoMark {
                serial_number: item.serial_number.trim().to_string(),
                registration_number: item.registration_number.trim().to_string(),
                mark: mark.clone(),
                owner: item.owner_name.trim().to_string(),
                status: item.mark_current_status.trim().to_string(),
                status_code: item.mark_current_status_code.trim().to_string(),
                status_category: item.mark_current_status_category.trim().to_string(),
                classes: collapse_classes(&item.international_classes),
                is_live: false,
            };
            record.is_live = record.status.to_uppercase().contains("LIVE")
                || record.status_category.to_uppercase().contains("LIVE");

            if clean_token(&mark) == clean_term {
                exact.push(record);
            } else {
                similar.push(record);
            }
        }

        Ok(LookupResult {
            term: term.to_string(),
            exact_matches: exact,
            similar,
            checked: true,
        })
    }

    async fn send_search(&self, term: &str) -> Result<reqwest::Response, Error> {
        let search_text = format!("mark:(\"{term}\") AND status:(\"LIVE\")");
        let rows = self.rows.to_string();
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("searchText", search_text.as_str()),
                ("rows", rows.as_str()),
                ("start", "0"),
            ])
            .header("Accept", "application/json")
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResult {
    #[serde(rename = "serialNumber")]
    serial_number: String,
    #[serde(rename = "registrationNumber")]
    registration_number: String,
    #[serde(rename = "markIdentification")]
    mark_identification: String,
    #[serde(rename = "markCurrentStatus")]
    mark_current_status: String,
    #[serde(rename = "markCurrentStatusCode")]
    mark_current_status_code: String,
    #[serde(rename = "markCurrentStatusCategory")]
    mark_current_status_category: String,
    #[serde(rename = "ownerName")]
    owner_name: String,
    #[serde(rename = "internationalClasses")]
    international_classes: serde_json::Value,
}

/// USPTO encodes class codes as either an array or a comma-joined string.
fn collapse_classes(raw: &serde_json::Value) -> Vec<String> {
    let items: Vec<String> = match raw {
        serde_json::Value::Array(values) => values
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        serde_json::Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_uppercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_refuses_construction() {
        let err = UsptoClient::new(UsptoConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingCredentials(_)));
    }

    #[test]
    fn collapse_classes_accepts_both_shapes() {
        let array = serde_json::json!(["009", " 042 ", "009"]);
        assert_eq!(collapse_classes(&array), vec!["009", "042"]);

        let joined = serde_json::json!("009, 042,009");
        assert_eq!(collapse_classes(&joined), vec!["009", "042"]);

        assert!(collapse_classes(&serde_json::json!(null)).is_empty());
    }
}
