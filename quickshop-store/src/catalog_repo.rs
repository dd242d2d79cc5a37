use async_trait::async_trait;
use quickshop_catalog::{ImageUrlMapping, Product, Variant};
use quickshop_core::repository::ProductRepository;
use quickshop_core::{StoreError, StoreResult};
use serde_json::Value;
use sqlx::PgPool;

use crate::database::{parse_id, store_error};

pub struct StoreProductRepository {
    pool: PgPool,
}

impl StoreProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    sale_period: i64,
    name: String,
    base_price: i64,
    variants: Value,
    default_image_url: String,
    image_urls: Value,
    enabled: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let variants: Vec<Variant> = serde_json::from_value(row.variants)
            .map_err(|e| StoreError::Corrupt(format!("variants of product {}: {}", row.id, e)))?;
        let image_urls: Vec<ImageUrlMapping> = serde_json::from_value(row.image_urls)
            .map_err(|e| StoreError::Corrupt(format!("image URLs of product {}: {}", row.id, e)))?;
        Ok(Product {
            id: row.id.to_string(),
            name: row.name,
            base_price: row.base_price,
            variants,
            default_image_url: row.default_image_url,
            image_urls,
            enabled: row.enabled,
            sale_period: row.sale_period,
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(StoreError::backend)
}

#[async_trait]
impl ProductRepository for StoreProductRepository {
    async fn list_products(&self, sale_period_id: i64, include_disabled: bool) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, sale_period, name, base_price, variants, default_image_url, image_urls, enabled
            FROM products
            WHERE sale_period = $1 AND (enabled OR $2)
            ORDER BY id
            "#,
        )
        .bind(sale_period_id)
        .bind(include_disabled)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn save_product(&self, product: &Product) -> StoreResult<String> {
        let variants = to_json(&product.variants)?;
        let image_urls = to_json(&product.image_urls)?;

        let id: i64 = if product.id.is_empty() {
            sqlx::query_scalar(
                r#"
                INSERT INTO products (sale_period, name, base_price, variants, default_image_url, image_urls, enabled)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(product.sale_period)
            .bind(&product.name)
            .bind(product.base_price)
            .bind(&variants)
            .bind(&product.default_image_url)
            .bind(&image_urls)
            .bind(product.enabled)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?
        } else {
            sqlx::query_scalar(
                r#"
                UPDATE products
                SET sale_period = $2, name = $3, base_price = $4, variants = $5,
                    default_image_url = $6, image_urls = $7, enabled = $8
                WHERE id = $1
                RETURNING id
                "#,
            )
            .bind(parse_id(&product.id)?)
            .bind(product.sale_period)
            .bind(&product.name)
            .bind(product.base_price)
            .bind(&variants)
            .bind(&product.default_image_url)
            .bind(&image_urls)
            .bind(product.enabled)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or(StoreError::NotFound)?
        };

        Ok(id.to_string())
    }
}
