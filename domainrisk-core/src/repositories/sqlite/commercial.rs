// domainrisk-core/src/repositories/sqlite/commercial.rs

use sqlx::Row;

use domainrisk_common::models::CommercialSale;

use crate::Error;

const INSERT_BATCH_SIZE: usize = 250;

pub struct CommercialRepository {
    pub pool: sqlx::Pool<sqlx::Sqlite>,
}

impl CommercialRepository {
    pub fn new(pool: sqlx::Pool<sqlx::Sqlite>) -> Self {
        Self { pool }
    }

    /// Swap the stored sales inventory with the provided rows.
    pub async fn replace_sales(&self, sales: &[CommercialSale]) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM commercial_sales")
            .execute(&mut *tx)
            .await?;
        for chunk in sales.chunks(INSERT_BATCH_SIZE) {
            for sale in chunk {
                sqlx::query(
                    "INSERT INTO commercial_sales (sld, normalized, prefix, length, price) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&sale.sld)
                .bind(&sale.normalized)
                .bind(&sale.prefix)
                .bind(sale.length)
                .bind(sale.price)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, Error> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM commercial_sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    /// Candidate sales filtered by optional prefixes and length bounds,
    /// ordered by length distance then price.
    pub async fn find_candidates(
        &self,
        prefixes: &[String],
        min_len: i64,
        max_len: i64,
        target_len: i64,
        limit: i64,
    ) -> Result<Vec<CommercialSale>, Error> {
        let mut builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT id, sld, normalized, prefix, length, price FROM commercial_sales WHERE length >= ",
        );
        builder.push_bind(min_len.max(1));
        builder.push(" AND length <= ");
        builder.push_bind(max_len);
        if !prefixes.is_empty() {
            builder.push(" AND prefix IN (");
            let mut separated = builder.separated(", ");
            for prefix in prefixes {
                separated.push_bind(prefix);
            }
            separated.push_unseparated(")");
        }
        builder.push(" ORDER BY ABS(length - ");
        builder.push_bind(target_len);
        builder.push(") ASC, price DESC LIMIT ");
        builder.push_bind(limit);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| {
                Ok(CommercialSale {
                    id: r.try_get("id")?,
                    sld: r.try_get("sld")?,
                    normalized: r.try_get("normalized")?,
                    prefix: r.try_get("prefix")?,
                    length: r.try_get("length")?,
                    price: r.try_get("price")?,
                })
            })
            .collect()
    }
}
