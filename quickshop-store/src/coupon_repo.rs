use async_trait::async_trait;
use quickshop_catalog::{Coupon, CouponDiscount, RequirementSet};
use quickshop_core::repository::CouponRepository;
use quickshop_core::{StoreError, StoreResult};
use sqlx::PgPool;

use crate::database::store_error;

pub struct StoreCouponRepository {
    pool: PgPool,
}

impl StoreCouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: i64,
    code: String,
    discount_percent: i64,
    min_purchase_quantity: Option<i64>,
    email_match: Option<String>,
    enabled: bool,
    public: bool,
    provider_id: Option<String>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        let requirements = RequirementSet {
            min_purchase_quantity: row.min_purchase_quantity,
            email_match: row.email_match,
        }
        .into_requirements();
        Coupon {
            id: row.id,
            code: row.code,
            description: None,
            discount: CouponDiscount::Percentage { amount: row.discount_percent },
            requirements,
            enabled: row.enabled,
            public: row.public,
            provider_id: row.provider_id,
        }
    }
}

const COUPON_COLUMNS: &str =
    "id, code, discount_percent, min_purchase_quantity, email_match, enabled, public, provider_id";

#[async_trait]
impl CouponRepository for StoreCouponRepository {
    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!("SELECT {} FROM coupons ORDER BY id", COUPON_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Coupon::from).collect())
    }

    async fn list_public_coupons(&self) -> StoreResult<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {} FROM coupons WHERE enabled AND public ORDER BY id",
            COUPON_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(rows.into_iter().map(Coupon::from).collect())
    }

    async fn get_coupon(&self, id: i64) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!("SELECT {} FROM coupons WHERE id = $1", COUPON_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(Coupon::from))
    }

    async fn enabled_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {} FROM coupons WHERE code = $1 AND enabled",
            COUPON_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(row.map(Coupon::from))
    }

    async fn save_coupon(&self, coupon: &Coupon) -> StoreResult<i64> {
        let requirements = RequirementSet::collect(&coupon.requirements)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        if coupon.id == 0 {
            sqlx::query_scalar(
                r#"
                INSERT INTO coupons (code, discount_percent, min_purchase_quantity, email_match, enabled, public, provider_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(&coupon.code)
            .bind(coupon.discount.percent())
            .bind(requirements.min_purchase_quantity)
            .bind(&requirements.email_match)
            .bind(coupon.enabled)
            .bind(coupon.public)
            .bind(&coupon.provider_id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
        } else {
            sqlx::query_scalar(
                r#"
                UPDATE coupons
                SET code = $2, discount_percent = $3, min_purchase_quantity = $4, email_match = $5,
                    enabled = $6, public = $7, provider_id = $8
                WHERE id = $1
                RETURNING id
                "#,
            )
            .bind(coupon.id)
            .bind(&coupon.code)
            .bind(coupon.discount.percent())
            .bind(requirements.min_purchase_quantity)
            .bind(&requirements.email_match)
            .bind(coupon.enabled)
            .bind(coupon.public)
            .bind(&coupon.provider_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or(StoreError::NotFound)
        }
    }
}
