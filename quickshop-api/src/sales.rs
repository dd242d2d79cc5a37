use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use quickshop_core::{OrderSummary, SalePeriod, StoreError};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::{authorize_admin, AdminClaims};
use crate::state::AppState;

/// Path value naming the sale period currently running.
pub const CURRENT_SALE: &str = "current";

#[derive(Debug, Serialize)]
pub struct SalePeriodsResponse {
    pub sale_periods: Vec<SalePeriod>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default)]
    pub show_collected: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sales", get(list_sale_periods).post(save_sale_period))
        .route("/sales/{sale_id}/order_summary", get(order_summary))
}

/// Resolves a `sale_id` path segment. `current` is open to everyone; naming a
/// period by id needs an admin token.
pub async fn resolve_sale_period(state: &AppState, headers: &HeaderMap, sale_id: &str) -> Result<i64, AppError> {
    if sale_id == CURRENT_SALE {
        let periods = state.sale_periods.list_sale_periods().await?;
        return SalePeriod::current(&periods, Utc::now())
            .and_then(|p| p.id)
            .ok_or_else(|| AppError::NotFound("No active sale period".to_string()));
    }
    authorize_admin(headers, &state.auth.secret)?;
    sale_id
        .parse()
        .map_err(|_| AppError::InvalidRequest("Invalid sales period".to_string()))
}

async fn list_sale_periods(
    State(state): State<AppState>,
    _admin: AdminClaims,
) -> Result<Json<SalePeriodsResponse>, AppError> {
    let sale_periods = state.sale_periods.list_sale_periods().await?;
    Ok(Json(SalePeriodsResponse { sale_periods }))
}

async fn save_sale_period(
    State(state): State<AppState>,
    _admin: AdminClaims,
    payload: Result<Json<SalePeriod>, JsonRejection>,
) -> Result<Json<SalePeriod>, AppError> {
    let Json(mut period) = payload.map_err(|_| AppError::invalid_body())?;
    if period.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("Invalid Name".to_string()));
    }

    let id = state.sale_periods.save_sale_period(&period).await.map_err(|e| match e {
        StoreError::NotFound => AppError::NotFound("Invalid sale period ID".to_string()),
        other => other.into(),
    })?;
    period.id = Some(id);
    tracing::info!(sale_period_id = id, name = %period.name, "sale period saved");
    Ok(Json(period))
}

async fn order_summary(
    State(state): State<AppState>,
    _admin: AdminClaims,
    headers: HeaderMap,
    Path(sale_id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<OrderSummary>, AppError> {
    let sale_period_id = resolve_sale_period(&state, &headers, &sale_id).await?;
    let orders = state.orders.list_paid_orders(sale_period_id).await?;
    let show_collected = query.show_collected.is_some_and(|v| !v.is_empty());
    Ok(Json(OrderSummary::from_orders(&orders, show_collected)))
}
