use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quickshop_catalog::LineItem;
use quickshop_core::repository::{OrderRepository, PaymentCompletion};
use quickshop_core::{Buyer, NewOrder, Order, StoreError, StoreResult};
use sqlx::PgPool;
use tracing::debug;

use crate::database::store_error;

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn items_for(&self, order_ids: &[String]) -> StoreResult<HashMap<String, Vec<LineItem>>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT order_id, product_id, product_name, variant, image_url, amount, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut items: HashMap<String, Vec<LineItem>> = HashMap::new();
        for row in rows {
            let (order_id, item) = row.into_parts();
            items.entry(order_id).or_default().push(item);
        }
        Ok(items)
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    name: String,
    matric_number: String,
    email: String,
    payment_reference: Option<String>,
    payment_time: Option<DateTime<Utc>>,
    collection_time: Option<DateTime<Utc>>,
    expired_at: Option<DateTime<Utc>>,
    cancelled: bool,
    coupon_id: Option<i64>,
    provider_coupon_id: Option<String>,
    sale_period: Option<i64>,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Order {
        Order {
            id: self.id,
            buyer: Buyer {
                name: self.name,
                matric_number: self.matric_number,
                email: self.email,
            },
            payment_reference: self.payment_reference,
            payment_time: self.payment_time,
            collection_time: self.collection_time,
            expired_at: self.expired_at,
            cancelled: self.cancelled,
            coupon_id: self.coupon_id,
            provider_coupon_id: self.provider_coupon_id,
            sale_period_id: self.sale_period,
            items,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: String,
    product_id: String,
    product_name: String,
    variant: String,
    image_url: String,
    amount: i64,
    unit_price: i64,
}

impl OrderItemRow {
    fn into_parts(self) -> (String, LineItem) {
        (
            self.order_id,
            LineItem {
                product_id: self.product_id,
                product_name: self.product_name,
                variant: self.variant,
                image_url: self.image_url,
                amount: self.amount,
                unit_price: self.unit_price,
            },
        )
    }
}

const ORDER_COLUMNS: &str = "id, name, matric_number, email, payment_reference, payment_time, collection_time, \
     expired_at, cancelled, coupon_id, provider_coupon_id, sale_period, created_at";

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn create_order(&self, order: &NewOrder) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, name, matric_number, email, coupon_id, sale_period)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&order.id)
        .bind(&order.buyer.name)
        .bind(&order.buyer.matric_number)
        .bind(&order.buyer.email)
        .bind(order.coupon_id)
        .bind(order.sale_period_id)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, product_name, variant, image_url, amount, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&order.id)
            .bind(position as i32)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(&item.variant)
            .bind(&item.image_url)
            .bind(item.amount)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }

        // A failed commit may still be an id collision under concurrent inserts.
        tx.commit().await.map_err(|e| StoreError::Conflict(e.to_string()))?;
        debug!(order_id = %order.id, items = order.items.len(), "order stored");
        Ok(())
    }

    async fn associate_payment(&self, order_id: &str, payment_reference: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE orders SET payment_reference = $2 WHERE id = $1")
            .bind(order_id)
            .bind(payment_reference)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn complete_checkout(
        &self,
        payment_reference: &str,
        paid_at: DateTime<Utc>,
        provider_coupon_id: Option<&str>,
    ) -> StoreResult<PaymentCompletion> {
        let updated: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET payment_time = $2, provider_coupon_id = COALESCE($3, provider_coupon_id)
            WHERE payment_reference = $1 AND payment_time IS NULL
            RETURNING id
            "#,
        )
        .bind(payment_reference)
        .bind(paid_at)
        .bind(provider_coupon_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        if let Some(order_id) = updated {
            return Ok(PaymentCompletion { order_id, newly_paid: true });
        }

        let existing: Option<String> = sqlx::query_scalar("SELECT id FROM orders WHERE payment_reference = $1")
            .bind(payment_reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        existing
            .map(|order_id| PaymentCompletion { order_id, newly_paid: false })
            .ok_or(StoreError::NotFound)
    }

    async fn expire_checkout(&self, payment_reference: &str, at: DateTime<Utc>) -> StoreResult<String> {
        sqlx::query_scalar(
            r#"
            UPDATE orders
            SET expired_at = COALESCE(expired_at, $2)
            WHERE payment_reference = $1
            RETURNING id
            "#,
        )
        .bind(payment_reference)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?
        .ok_or(StoreError::NotFound)
    }

    async fn get_order(&self, id: &str) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut items = self.items_for(&[row.id.clone()]).await?;
        let items = items.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_order(items)))
    }

    async fn set_cancelled(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE orders SET cancelled = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn mark_collected(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE orders SET collection_time = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_paid_orders(&self, sale_period_id: i64) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders \
             WHERE sale_period = $1 AND payment_time IS NOT NULL AND NOT cancelled \
             ORDER BY payment_time",
            ORDER_COLUMNS
        ))
        .bind(sale_period_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut items = self.items_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect())
    }
}
