// domainrisk-common/src/models/batch.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// An uploaded CSV dataset and its aggregate statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvBatch {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub original_filename: String,
    pub row_count: i64,
    pub unique_domains: i64,
    pub existing_domains: i64,
    pub duplicate_rows: i64,
    pub processed_domains: i64,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One row per domain occurrence in a batch. The batch's unique domain
/// set is the distinct `domain_normalized` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainBatch {
    pub id: i64,
    pub batch_id: i64,
    pub domain: String,
    pub domain_normalized: String,
    pub row_index: i64,
}

/// A distinct domain pulled out of a batch for evaluation.
#[derive(Debug, Clone)]
pub struct BatchDomain {
    pub domain: String,
    pub domain_normalized: String,
    pub row_index: i64,
    pub has_result: bool,
}

/// Lifecycle status of a batch evaluation request. Transitions are
/// monotonic; terminal states set `finished_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Running => "running",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Running)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "running" => Ok(RequestStatus::Running),
            "completed" => Ok(RequestStatus::Completed),
            "failed" => Ok(RequestStatus::Failed),
            "cancelled" => Ok(RequestStatus::Cancelled),
            other => Err(Error::Parse(format!("unknown request status: {other}"))),
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracking record for one evaluation attempt against a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub id: i64,
    pub batch_id: i64,
    pub request_type: String,
    pub status: RequestStatus,
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
