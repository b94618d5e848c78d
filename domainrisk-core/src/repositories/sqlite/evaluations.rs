// domainrisk-core/src/repositories/sqlite/evaluations.rs

use std::collections::HashSet;

use chrono::Utc;
use sqlx::Row;

use domainrisk_common::models::Evaluation;

use super::normalize_domain_key;
use crate::Error;

const KEY_CHUNK_SIZE: usize = 500;

pub struct EvaluationRepository {
    pub pool: sqlx::Pool<sqlx::Sqlite>,
}

impl EvaluationRepository {
    pub fn new(pool: sqlx::Pool<sqlx::Sqlite>) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the evaluation for a domain. The normalized
    /// domain is the conflict key, so re-running a batch stays idempotent.
    pub async fn save(&self, eval: &Evaluation) -> Result<(), Error> {
        let domain = eval.domain.trim();
        let normalized = if eval.domain_normalized.trim().is_empty() {
            normalize_domain_key(domain)
        } else {
            normalize_domain_key(&eval.domain_normalized)
        };

        sqlx::query(
            r#"
            INSERT INTO evaluations (
                domain, domain_normalized, trademark_score, trademark_type,
                matched_trademark, trademark_confidence, vice_score,
                vice_categories_json, vice_confidence, overall_recommendation,
                processing_time_ms, explanation, commercial_override,
                commercial_source, commercial_similarity, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(domain_normalized) DO UPDATE SET
                domain = excluded.domain,
                trademark_score = excluded.trademark_score,
                trademark_type = excluded.trademark_type,
                matched_trademark = excluded.matched_trademark,
                trademark_confidence = excluded.trademark_confidence,
                vice_score = excluded.vice_score,
                vice_categories_json = excluded.vice_categories_json,
                vice_confidence = excluded.vice_confidence,
                overall_recommendation = excluded.overall_recommendation,
                processing_time_ms = excluded.processing_time_ms,
                explanation = excluded.explanation,
                commercial_override = excluded.commercial_override,
                commercial_source = excluded.commercial_source,
                commercial_similarity = excluded.commercial_similarity
            "#,
        )
        .bind(domain)
        .bind(&normalized)
        .bind(eval.trademark_score)
        .bind(eval.trademark_type.as_str())
        .bind(&eval.matched_trademark)
        .bind(eval.trademark_confidence)
        .bind(eval.vice_score)
        .bind(&eval.vice_categories_json)
        .bind(eval.vice_confidence)
        .bind(eval.overall_recommendation.as_str())
        .bind(eval.processing_time_ms)
        .bind(&eval.explanation)
        .bind(eval.commercial_override)
        .bind(&eval.commercial_source)
        .bind(eval.commercial_similarity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_domain(&self, normalized: &str) -> Result<Option<Evaluation>, Error> {
        let row = sqlx::query(
            r#"
            SELECT id, domain, domain_normalized, trademark_score, trademark_type,
                   matched_trademark, trademark_confidence, vice_score,
                   vice_categories_json, vice_confidence, overall_recommendation,
                   processing_time_ms, explanation, commercial_override,
                   commercial_source, commercial_similarity, created_at
            FROM evaluations
            WHERE domain_normalized = ?
            "#,
        )
        .bind(normalize_domain_key(normalized))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(Evaluation {
                id: r.try_get("id")?,
                domain: r.try_get("domain")?,
                domain_normalized: r.try_get("domain_normalized")?,
                trademark_score: r.try_get("trademark_score")?,
                trademark_type: r.try_get::<String, _>("trademark_type")?.parse()?,
                matched_trademark: r.try_get("matched_trademark")?,
                trademark_confidence: r.try_get("trademark_confidence")?,
                vice_score: r.try_get("vice_score")?,
                vice_categories_json: r.try_get("vice_categories_json")?,
                vice_confidence: r.try_get("vice_confidence")?,
                overall_recommendation: r.try_get::<String, _>("overall_recommendation")?.parse()?,
                processing_time_ms: r.try_get("processing_time_ms")?,
                explanation: r.try_get("explanation")?,
                commercial_override: r.try_get("commercial_override")?,
                commercial_source: r.try_get("commercial_source")?,
                commercial_similarity: r.try_get("commercial_similarity")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }

    pub async fn count(&self) -> Result<i64, Error> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM evaluations")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    /// The subset of the supplied domains that already carry evaluations.
    pub async fn existing_keys(&self, domains: &[String]) -> Result<HashSet<String>, Error> {
        let mut result = HashSet::new();
        if domains.is_empty() {
            return Ok(result);
        }

        let mut unique: Vec<String> = domains
            .iter()
            .map(|d| normalize_domain_key(d))
            .filter(|d| !d.is_empty())
            .collect();
        unique.sort();
        unique.dedup();

        for chunk in unique.chunks(KEY_CHUNK_SIZE) {
            let mut builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
                "SELECT domain_normalized FROM evaluations WHERE domain_normalized IN (",
            );
            let mut separated = builder.separated(", ");
            for key in chunk {
                separated.push_bind(key);
            }
            separated.push_unseparated(")");

            let rows = builder.build().fetch_all(&self.pool).await?;
            for row in rows {
                result.insert(row.try_get("domain_normalized")?);
            }
        }
        Ok(result)
    }
}
