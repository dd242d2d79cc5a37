use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quickshop_core::repository::{SalePeriodRepository, StoreClosureRepository};
use quickshop_core::{SalePeriod, StoreClosure, StoreError, StoreResult};
use sqlx::PgPool;

use crate::database::store_error;

/// Sale periods and store closures.
pub struct StoreShopRepository {
    pool: PgPool,
}

impl StoreShopRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SalePeriodRow {
    id: i64,
    name: String,
    start_time: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ClosureRow {
    id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    message: String,
    show_order_check: bool,
}

#[async_trait]
impl SalePeriodRepository for StoreShopRepository {
    async fn list_sale_periods(&self) -> StoreResult<Vec<SalePeriod>> {
        let rows = sqlx::query_as::<_, SalePeriodRow>("SELECT id, name, start_time FROM sale_periods ORDER BY start_time")
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows
            .into_iter()
            .map(|r| SalePeriod { id: Some(r.id), name: r.name, start_time: r.start_time })
            .collect())
    }

    async fn save_sale_period(&self, period: &SalePeriod) -> StoreResult<i64> {
        match period.id {
            None => sqlx::query_scalar("INSERT INTO sale_periods (name, start_time) VALUES ($1, $2) RETURNING id")
                .bind(&period.name)
                .bind(period.start_time)
                .fetch_one(&self.pool)
                .await
                .map_err(store_error),
            Some(id) => sqlx::query_scalar(
                "UPDATE sale_periods SET name = $2, start_time = $3 WHERE id = $1 RETURNING id",
            )
            .bind(id)
            .bind(&period.name)
            .bind(period.start_time)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or(StoreError::NotFound),
        }
    }
}

#[async_trait]
impl StoreClosureRepository for StoreShopRepository {
    async fn list_closures(&self) -> StoreResult<Vec<StoreClosure>> {
        let rows = sqlx::query_as::<_, ClosureRow>(
            "SELECT id, start_time, end_time, message, show_order_check FROM store_closures ORDER BY start_time",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(rows
            .into_iter()
            .map(|r| StoreClosure {
                id: Some(r.id),
                start_time: r.start_time,
                end_time: r.end_time,
                message: r.message,
                show_order_check: r.show_order_check,
            })
            .collect())
    }

    async fn save_closure(&self, closure: &StoreClosure) -> StoreResult<i64> {
        match closure.id {
            None => sqlx::query_scalar(
                r#"
                INSERT INTO store_closures (start_time, end_time, message, show_order_check)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(closure.start_time)
            .bind(closure.end_time)
            .bind(&closure.message)
            .bind(closure.show_order_check)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error),
            Some(id) => sqlx::query_scalar(
                r#"
                UPDATE store_closures
                SET start_time = $2, end_time = $3, message = $4, show_order_check = $5
                WHERE id = $1
                RETURNING id
                "#,
            )
            .bind(id)
            .bind(closure.start_time)
            .bind(closure.end_time)
            .bind(&closure.message)
            .bind(closure.show_order_check)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or(StoreError::NotFound),
        }
    }

    async fn delete_closure(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM store_closures WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
