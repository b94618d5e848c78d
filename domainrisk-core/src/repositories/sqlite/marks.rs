// domainrisk-core/src/repositories/sqlite/marks.rs

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{info, warn};

use domainrisk_common::models::{Mark, PopularMark};

use crate::Error;

const INSERT_BATCH_SIZE: usize = 250;

pub struct MarkRepository {
    pub pool: sqlx::Pool<sqlx::Sqlite>,
}

impl MarkRepository {
    pub fn new(pool: sqlx::Pool<sqlx::Sqlite>) -> Self {
        Self { pool }
    }

    /// Insert or update a mark keyed by its serial number.
    pub async fn upsert_mark(&self, mark: &Mark) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO marks (serial, registration, mark, mark_normalized, mark_no_spaces,
                               owner, classes_json, is_fanciful, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(serial) DO UPDATE SET
                registration = excluded.registration,
                mark = excluded.mark,
                mark_normalized = excluded.mark_normalized,
                mark_no_spaces = excluded.mark_no_spaces,
                owner = excluded.owner,
                classes_json = excluded.classes_json,
                is_fanciful = excluded.is_fanciful,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&mark.serial)
        .bind(&mark.registration)
        .bind(&mark.mark)
        .bind(&mark.mark_normalized)
        .bind(&mark.mark_no_spaces)
        .bind(&mark.owner)
        .bind(&mark.classes_json)
        .bind(mark.is_fanciful)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_marks(&self) -> Result<i64, Error> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM marks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    /// Load marks ranked by popularity, bounded by `limit`. This feeds the
    /// trademark index; marks without a popularity aggregate are skipped.
    pub async fn load_popular_ranked(&self, limit: i64) -> Result<Vec<Mark>, Error> {
        let started = std::time::Instant::now();
        let rows = sqlx::query(
            r#"
            SELECT marks.serial, marks.registration, marks.mark, marks.mark_normalized,
                   marks.mark_no_spaces, marks.owner, marks.classes_json, marks.is_fanciful,
                   marks.created_at, marks.updated_at
            FROM popular_marks
            JOIN marks ON marks.mark_no_spaces = popular_marks.normalized
            ORDER BY popular_marks.total DESC, marks.updated_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        let marks: Vec<Mark> = rows.iter().map(row_to_mark).collect::<Result<_, _>>()?;
        if marks.is_empty() {
            warn!(marks_limit = limit, "popular marks query returned no rows");
        }
        info!(
            marks_returned = marks.len(),
            marks_limit = limit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "queried popular marks for scoring"
        );
        Ok(marks)
    }

    /// Aggregate mark frequencies by normalized token straight off the
    /// marks table.
    pub async fn aggregate_popular_marks(
        &self,
        limit: i64,
        min_count: i64,
    ) -> Result<Vec<PopularMark>, Error> {
        let limit = if limit > 0 { limit } else { 500_000 };
        let min_count = if min_count > 0 { min_count } else { 2 };
        let rows = sqlx::query(
            r#"
            SELECT LOWER(mark_no_spaces) AS normalized, MAX(mark) AS mark, COUNT(*) AS total
            FROM marks
            GROUP BY LOWER(mark_no_spaces)
            HAVING COUNT(*) >= ?
            ORDER BY total DESC
            LIMIT ?
            "#,
        )
        .bind(min_count)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(PopularMark {
                    normalized: r.try_get("normalized")?,
                    mark: r.try_get("mark")?,
                    total: r.try_get("total")?,
                })
            })
            .collect()
    }

    /// Atomically swap the popular_marks table with the provided rows.
    pub async fn replace_popular_marks(&self, marks: &[PopularMark]) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM popular_marks")
            .execute(&mut *tx)
            .await?;
        for chunk in marks.chunks(INSERT_BATCH_SIZE) {
            for mark in chunk {
                sqlx::query(
                    "INSERT INTO popular_marks (normalized, mark, total, updated_at) VALUES (?, ?, ?, ?)",
                )
                .bind(&mark.normalized)
                .bind(&mark.mark)
                .bind(mark.total)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_popular_marks(&self, limit: i64) -> Result<Vec<PopularMark>, Error> {
        let rows = sqlx::query(
            "SELECT normalized, mark, total FROM popular_marks ORDER BY total DESC LIMIT ?",
        )
        .bind(if limit > 0 { limit } else { i64::MAX })
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(PopularMark {
                    normalized: r.try_get("normalized")?,
                    mark: r.try_get("mark")?,
                    total: r.try_get("total")?,
                })
            })
            .collect()
    }
}

fn row_to_mark(row: &sqlx::sqlite::SqliteRow) -> Result<Mark, Error> {
    Ok(Mark {
        serial: row.try_get("serial")?,
        registration: row.try_get("registration")?,
        mark: row.try_get("mark")?,
        mark_normalized: row.try_get("mark_normalized")?,
        mark_no_spaces: row.try_get("mark_no_spaces")?,
        owner: row.try_get("owner")?,
        classes_json: row.try_get("classes_json")?,
        is_fanciful: row.try_get("is_fanciful")?,
        created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
        updated_at: row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
    })
}
