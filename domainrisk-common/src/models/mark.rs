// domainrisk-common/src/models/mark.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trademark entry persisted from the bulk XML feed. Read-only to the
/// evaluation core; `mark_no_spaces` is the join key into popularity
/// aggregates and the exact-match index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mark {
    pub serial: String,
    pub registration: String,
    pub mark: String,
    pub mark_normalized: String,
    pub mark_no_spaces: String,
    pub owner: String,
    pub classes_json: String,
    pub is_fanciful: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Mark {
    /// Persist the class code list as JSON text.
    pub fn set_classes(&mut self, classes: &[String]) {
        self.classes_json = serde_json::to_string(classes).unwrap_or_else(|_| "[]".to_string());
    }

    /// Decode the stored class codes; malformed text reads as empty.
    pub fn classes(&self) -> Vec<String> {
        if self.classes_json.trim().is_empty() {
            return Vec::new();
        }
        serde_json::from_str(&self.classes_json).unwrap_or_default()
    }
}

/// Aggregated mark frequency keyed by the normalized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularMark {
    pub normalized: String,
    pub mark: String,
    pub total: i64,
}
