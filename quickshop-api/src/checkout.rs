use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use quickshop_order::CheckoutRequest;
use serde::Serialize;

use crate::closures::ensure_store_open;
use crate::error::AppError;
use crate::sales::{resolve_sale_period, CURRENT_SALE};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    #[serde(rename = "checkoutURL")]
    pub checkout_url: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/checkout", post(checkout))
}

/// Prices the cart against the current sale period and opens a payment session.
async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e, "rejected checkout body");
        AppError::invalid_body()
    })?;
    ensure_store_open(&state).await?;

    let sale_period_id = resolve_sale_period(&state, &headers, CURRENT_SALE).await?;
    let catalog = state.products.list_products(sale_period_id, false).await?;

    let coupon = match &request.coupon {
        Some(code) => state.coupons.enabled_coupon_by_code(code).await?,
        None => None,
    };

    let order = state.builder.build(request, &catalog, coupon)?;
    let outcome = state.orchestrator.checkout(order, Some(sale_period_id)).await?;

    Ok(Json(CheckoutResponse {
        checkout_url: outcome.checkout_url,
    }))
}
