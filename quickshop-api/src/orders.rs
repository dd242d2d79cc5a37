use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use quickshop_catalog::LineItem;
use quickshop_core::{Order, OrderStatus};
use quickshop_order::CancelOutcome;
use quickshop_shared::{censor_back, censor_email, censor_front};
use serde::{Deserialize, Serialize};

use crate::coupons::PublicCoupon;
use crate::error::AppError;
use crate::middleware::{authorize_admin, AdminClaims};
use crate::state::AppState;

const MAX_STARS: usize = 10;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderResponse>,
}

/// Order as shown on the public order page, with buyer details censored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub matric_number: String,
    pub payment_ref: String,
    pub sale_period: Option<i64>,
    pub status: OrderStatus,
    pub payment_time: Option<DateTime<Utc>>,
    pub collection_time: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub coupon: Option<PublicCoupon>,
    pub items: Vec<LineItem>,
    pub subtotal: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub include_cancelled: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}", get(lookup_order))
        .route("/orders/{id}/collect", post(collect_order))
        .route("/orders/{id}/cancel", post(cancel_order))
}

// ============================================================================
// Handlers
// ============================================================================

async fn lookup_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<OrdersResponse>, AppError> {
    let include_cancelled = query.include_cancelled.is_some_and(|v| !v.is_empty());
    if include_cancelled {
        authorize_admin(&headers, &state.auth.secret)?;
    }

    let order = state
        .orders
        .get_order(&order_id)
        .await?
        .filter(|o| include_cancelled || !o.cancelled)
        .ok_or_else(|| AppError::NotFound("Invalid order ID".to_string()))?;

    let coupon = match order.coupon_id {
        Some(id) => state.coupons.get_coupon(id).await?,
        None => None,
    };
    let subtotal = order.subtotal();
    let total = coupon.as_ref().map_or(subtotal, |c| c.apply(subtotal));

    Ok(Json(OrdersResponse {
        orders: vec![censored(order, coupon.map(PublicCoupon::from), subtotal, total)],
    }))
}

async fn collect_order(
    State(state): State<AppState>,
    _admin: AdminClaims,
    Path(order_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.manager.collect(&order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_order(
    State(state): State<AppState>,
    admin: AdminClaims,
    Path(order_id): Path<String>,
) -> Result<StatusCode, AppError> {
    match state.manager.cancel(&order_id).await? {
        CancelOutcome::Cancelled => {
            tracing::info!(order_id = %order_id, admin = %admin.sub, "order cancelled by admin")
        }
        CancelOutcome::AlreadyCancelled => {
            tracing::debug!(order_id = %order_id, "order was already cancelled")
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

fn censored(order: Order, coupon: Option<PublicCoupon>, subtotal: i64, total: i64) -> OrderResponse {
    let status = order.status();
    OrderResponse {
        name: censor_back(&order.buyer.name, 4, MAX_STARS, ' '),
        email: censor_email(&order.buyer.email),
        matric_number: censor_front(&order.buyer.matric_number, 4, MAX_STARS, ' '),
        payment_ref: order
            .payment_reference
            .as_deref()
            .map(|r| censor_front(r, 8, MAX_STARS, ' '))
            .unwrap_or_default(),
        id: order.id,
        sale_period: order.sale_period_id,
        status,
        payment_time: order.payment_time,
        collection_time: order.collection_time,
        cancelled: order.cancelled,
        coupon,
        items: order.items,
        subtotal,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickshop_core::Buyer;

    #[test]
    fn test_censored_hides_buyer_details() {
        let order = Order {
            id: "CDEFHJ".to_string(),
            buyer: Buyer {
                name: "Beatrice Lim".to_string(),
                matric_number: "U1234567A".to_string(),
                email: "beatrice@e.ntu.edu.sg".to_string(),
            },
            payment_reference: Some("cs_test_a1b2c3d4e5f6g7h8".to_string()),
            payment_time: Some(Utc::now()),
            collection_time: None,
            expired_at: None,
            cancelled: false,
            coupon_id: None,
            provider_coupon_id: None,
            sale_period_id: Some(1),
            items: vec![],
            created_at: Utc::now(),
        };

        let view = censored(order, None, 0, 0);
        assert_eq!(view.name, "Beatrice ***");
        assert_eq!(view.email, "bea*****@e.ntu.edu.sg");
        assert_eq!(view.matric_number, "*****567A");
        assert_eq!(view.payment_ref, "**********e5f6g7h8");
        assert_eq!(view.status, OrderStatus::Paid);
    }
}
