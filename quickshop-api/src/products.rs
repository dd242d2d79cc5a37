use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use quickshop_catalog::Product;
use quickshop_core::StoreError;
use serde::{Deserialize, Serialize};

use crate::closures::ensure_store_open;
use crate::error::AppError;
use crate::middleware::AdminClaims;
use crate::sales::resolve_sale_period;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default)]
    pub include_disabled: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/sales/{sale_id}/products", get(list_products).post(save_product))
}

async fn list_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(sale_id): Path<String>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<ProductsResponse>, AppError> {
    let include_disabled = query.include_disabled.is_some_and(|v| !v.is_empty());
    if include_disabled {
        crate::middleware::authorize_admin(&headers, &state.auth.secret)?;
    } else {
        ensure_store_open(&state).await?;
    }

    let sale_period_id = resolve_sale_period(&state, &headers, &sale_id).await?;
    let products = state.products.list_products(sale_period_id, include_disabled).await?;
    Ok(Json(ProductsResponse { products }))
}

async fn save_product(
    State(state): State<AppState>,
    _admin: AdminClaims,
    headers: HeaderMap,
    Path(sale_id): Path<String>,
    body: Bytes,
) -> Result<Json<Product>, AppError> {
    let mut product = parse_product(&body)?;
    product.sale_period = resolve_sale_period(&state, &headers, &sale_id).await?;
    product
        .validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    product.id = state.products.save_product(&product).await.map_err(|e| match e {
        StoreError::NotFound => AppError::InvalidRequest("Invalid product ID".to_string()),
        other => other.into(),
    })?;
    tracing::info!(product_id = %product.id, sale_period_id = product.sale_period, "product saved");
    Ok(Json(product))
}

/// Admin saves must state `enabled` explicitly.
fn parse_product(body: &[u8]) -> Result<Product, AppError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| AppError::invalid_body())?;
    if !value.get("enabled").is_some_and(serde_json::Value::is_boolean) {
        tracing::debug!("product save without enabled flag");
        return Err(AppError::invalid_body());
    }
    serde_json::from_value(value).map_err(|_| AppError::invalid_body())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_requires_enabled() {
        let body = br#"{"name":"Tote","basePrice":500}"#;
        assert!(matches!(parse_product(body), Err(AppError::InvalidRequest(_))));

        let body = br#"{"name":"Tote","basePrice":500,"enabled":false}"#;
        let product = parse_product(body).unwrap();
        assert!(!product.enabled);
        assert!(product.id.is_empty());
    }
}
