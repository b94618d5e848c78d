// domainrisk-core/src/repositories/sqlite/batches.rs

use chrono::{DateTime, Utc};
use sqlx::Row;

use domainrisk_common::models::{
    BatchDomain, BatchRequest, CsvBatch, DomainBatch, RequestStatus,
};

use super::normalize_domain_key;
use crate::Error;

const INSERT_BATCH_SIZE: usize = 500;

pub struct BatchRepository {
    pub pool: sqlx::Pool<sqlx::Sqlite>,
}

impl BatchRepository {
    pub fn new(pool: sqlx::Pool<sqlx::Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn create_csv_batch(
        &self,
        name: &str,
        owner: &str,
        filename: &str,
    ) -> Result<CsvBatch, Error> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO csv_batches (name, owner, original_filename, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(owner)
        .bind(filename)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(CsvBatch {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            owner: owner.to_string(),
            original_filename: filename.to_string(),
            row_count: 0,
            unique_domains: 0,
            existing_domains: 0,
            duplicate_rows: 0,
            processed_domains: 0,
            last_evaluated_at: None,
            created_at,
        })
    }

    pub async fn get_csv_batch(&self, batch_id: i64) -> Result<Option<CsvBatch>, Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, owner, original_filename, row_count, unique_domains,
                   existing_domains, duplicate_rows, processed_domains,
                   last_evaluated_at, created_at
            FROM csv_batches
            WHERE id = ?
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(CsvBatch {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                owner: r.try_get("owner")?,
                original_filename: r.try_get("original_filename")?,
                row_count: r.try_get("row_count")?,
                unique_domains: r.try_get("unique_domains")?,
                existing_domains: r.try_get("existing_domains")?,
                duplicate_rows: r.try_get("duplicate_rows")?,
                processed_domains: r.try_get("processed_domains")?,
                last_evaluated_at: r.try_get::<Option<DateTime<Utc>>, _>("last_evaluated_at")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }

    /// Update aggregate statistics for a batch.
    pub async fn update_csv_batch_stats(
        &self,
        batch_id: i64,
        row_count: i64,
        unique_domains: i64,
        existing_domains: i64,
        duplicate_rows: i64,
        processed: i64,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE csv_batches
            SET row_count = ?, unique_domains = ?, existing_domains = ?,
                duplicate_rows = ?, processed_domains = ?
            WHERE id = ?
            "#,
        )
        .bind(row_count)
        .bind(unique_domains)
        .bind(existing_domains)
        .bind(duplicate_rows)
        .bind(processed)
        .bind(batch_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace all domain rows associated with a batch.
    pub async fn replace_domain_batch(
        &self,
        batch_id: i64,
        rows: &[DomainBatch],
    ) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM domain_batches WHERE batch_id = ?")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;
        for chunk in rows.chunks(INSERT_BATCH_SIZE) {
            for row in chunk {
                sqlx::query(
                    r#"
                    INSERT INTO domain_batches (batch_id, domain, domain_normalized, row_index, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(batch_id)
                .bind(&row.domain)
                .bind(normalize_domain_key(if row.domain_normalized.is_empty() {
                    &row.domain
                } else {
                    &row.domain_normalized
                }))
                .bind(row.row_index)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Number of distinct domains in a batch.
    pub async fn count_batch_domains(&self, batch_id: i64) -> Result<i64, Error> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT domain_normalized) AS count FROM domain_batches WHERE batch_id = ?",
        )
        .bind(batch_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("count")?)
    }

    /// Number of domains in a batch that already have evaluation rows.
    pub async fn count_batch_results(&self, batch_id: i64) -> Result<i64, Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(DISTINCT e.domain_normalized) AS count
            FROM domain_batches db
            JOIN evaluations e ON e.domain_normalized = db.domain_normalized
            WHERE db.batch_id = ?
            "#,
        )
        .bind(batch_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("count")?)
    }

    /// Distinct domains for a batch in row order, with evaluation status.
    pub async fn list_batch_domains_for_eval(
        &self,
        batch_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<BatchDomain>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT MIN(db.domain) AS domain,
                   db.domain_normalized AS domain_normalized,
                   MIN(db.row_index) AS row_index,
                   CASE WHEN SUM(CASE WHEN e.id IS NULL THEN 0 ELSE 1 END) > 0
                        THEN 1 ELSE 0 END AS has_result
            FROM domain_batches db
            LEFT JOIN evaluations e ON e.domain_normalized = db.domain_normalized
            WHERE db.batch_id = ?
            GROUP BY db.domain_normalized
            ORDER BY MIN(db.row_index)
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(batch_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(BatchDomain {
                    domain: r.try_get("domain")?,
                    domain_normalized: r.try_get("domain_normalized")?,
                    row_index: r.try_get("row_index")?,
                    has_result: r.try_get::<i64, _>("has_result")? != 0,
                })
            })
            .collect()
    }

    /// Normalized domains already evaluated for the batch; feeds resume.
    pub async fn evaluated_domains_for_batch(&self, batch_id: i64) -> Result<Vec<String>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT e.domain_normalized AS domain_normalized
            FROM evaluations e
            JOIN domain_batches db ON db.domain_normalized = e.domain_normalized
            WHERE db.batch_id = ?
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| Ok(r.try_get("domain_normalized")?))
            .collect()
    }

    pub async fn create_batch_request(
        &self,
        batch_id: i64,
        request_type: &str,
        status: RequestStatus,
        job_id: &str,
    ) -> Result<BatchRequest, Error> {
        let started_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO batch_requests (batch_id, request_type, status, job_id, started_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(batch_id)
        .bind(request_type)
        .bind(status.as_str())
        .bind(job_id)
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        Ok(BatchRequest {
            id: result.last_insert_rowid(),
            batch_id,
            request_type: request_type.to_string(),
            status,
            job_id: job_id.to_string(),
            started_at,
            finished_at: None,
        })
    }

    /// Update a request's status; terminal states stamp `finished_at`.
    pub async fn update_batch_request(
        &self,
        request_id: i64,
        status: RequestStatus,
    ) -> Result<(), Error> {
        if status.is_terminal() {
            sqlx::query("UPDATE batch_requests SET status = ?, finished_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(Utc::now())
                .bind(request_id)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query("UPDATE batch_requests SET status = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(request_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn get_batch_request(&self, request_id: i64) -> Result<Option<BatchRequest>, Error> {
        let row = sqlx::query(
            r#"
            SELECT id, batch_id, request_type, status, job_id, started_at, finished_at
            FROM batch_requests
            WHERE id = ?
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(BatchRequest {
                id: r.try_get("id")?,
                batch_id: r.try_get("batch_id")?,
                request_type: r.try_get("request_type")?,
                status: r.try_get::<String, _>("status")?.parse()?,
                job_id: r.try_get("job_id")?,
                started_at: r.try_get("started_at")?,
                finished_at: r.try_get::<Option<DateTime<Utc>>, _>("finished_at")?,
            })
        })
        .transpose()
    }

    /// Refresh processed counts and the evaluation timestamp for a batch.
    pub async fn update_batch_processing_info(&self, batch_id: i64) -> Result<(), Error> {
        let processed = self.count_batch_results(batch_id).await?;
        sqlx::query(
            "UPDATE csv_batches SET processed_domains = ?, last_evaluated_at = ? WHERE id = ?",
        )
        .bind(processed)
        .bind(Utc::now())
        .bind(batch_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
