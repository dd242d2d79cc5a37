use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use quickshop_catalog::{Coupon, CouponDiscount, CouponError, CouponRequirement};
use quickshop_core::StoreError;
use serde::{Deserialize, Serialize};

use crate::closures::ensure_store_open;
use crate::error::AppError;
use crate::middleware::{authorize_admin, AdminClaims};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// What shoppers may see of a coupon.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCoupon {
    pub requirements: Vec<CouponRequirement>,
    pub coupon_code: String,
    pub discount: CouponDiscount,
}

impl From<Coupon> for PublicCoupon {
    fn from(coupon: Coupon) -> Self {
        Self {
            requirements: coupon.requirements,
            coupon_code: coupon.code,
            discount: coupon.discount,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CouponView {
    Public(PublicCoupon),
    Admin(Coupon),
}

#[derive(Debug, Serialize)]
pub struct CouponsResponse {
    pub coupons: Vec<CouponView>,
}

#[derive(Debug, Deserialize)]
pub struct ListCouponsQuery {
    #[serde(default)]
    pub include_disabled: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sales/{sale_id}/coupons", get(list_coupons).post(save_coupon))
        .route("/sales/{sale_id}/coupons/{code}", get(lookup_coupon))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_coupons(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListCouponsQuery>,
) -> Result<Json<CouponsResponse>, AppError> {
    let include_disabled = query.include_disabled.is_some_and(|v| !v.is_empty());
    if !include_disabled {
        ensure_store_open(&state).await?;
        let coupons = state.coupons.list_public_coupons().await?;
        return Ok(Json(CouponsResponse {
            coupons: coupons.into_iter().map(|c| CouponView::Public(c.into())).collect(),
        }));
    }

    authorize_admin(&headers, &state.auth.secret)?;
    let coupons = state.coupons.list_coupons().await?;
    let mut views = Vec::with_capacity(coupons.len());
    for mut coupon in coupons {
        coupon.description = provider_description(&state, &coupon).await;
        views.push(CouponView::Admin(coupon));
    }
    Ok(Json(CouponsResponse { coupons: views }))
}

async fn lookup_coupon(
    State(state): State<AppState>,
    Path((_sale_id, code)): Path<(String, String)>,
) -> Result<Json<PublicCoupon>, AppError> {
    ensure_store_open(&state).await?;
    let coupon = state
        .coupons
        .enabled_coupon_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid coupon ID".to_string()))?;
    Ok(Json(coupon.into()))
}

async fn save_coupon(
    State(state): State<AppState>,
    _admin: AdminClaims,
    payload: Result<Json<Coupon>, JsonRejection>,
) -> Result<Json<Coupon>, AppError> {
    let Json(mut coupon) = payload.map_err(|_| AppError::invalid_body())?;
    let requirements = coupon.validate().map_err(invalid_coupon_body)?;
    coupon.requirements = requirements.into_requirements();

    if coupon.enabled {
        let description = coupon
            .description
            .clone()
            .ok_or_else(|| AppError::InvalidRequest("Invalid Body: Missing Stripe Desc".to_string()))?;
        let provider_id = state
            .payments
            .upsert_coupon(coupon.provider_id.as_deref(), &description, coupon.discount.percent())
            .await?;
        coupon.provider_id = Some(provider_id);
    }

    let is_new = coupon.id == 0;
    coupon.id = state.coupons.save_coupon(&coupon).await.map_err(|e| match e {
        StoreError::NotFound => AppError::InvalidRequest("Invalid Coupon ID".to_string()),
        StoreError::Conflict(_) => AppError::InvalidRequest("Coupon code already exists".to_string()),
        other => other.into(),
    })?;

    match (&coupon.description, coupon.enabled) {
        (Some(description), true) => state.coupon_names.insert(coupon.id, description.clone()).await,
        _ => state.coupon_names.invalidate(coupon.id).await,
    }
    tracing::info!(coupon_id = coupon.id, code = %coupon.code, created = is_new, enabled = coupon.enabled, "coupon saved");
    Ok(Json(coupon))
}

/// Provider-side description for the admin view, through the bounded cache.
/// Provider failures only cost the description.
async fn provider_description(state: &AppState, coupon: &Coupon) -> Option<String> {
    let provider_id = coupon.provider_id.as_deref().filter(|id| !id.is_empty())?;
    if let Some(name) = state.coupon_names.get(coupon.id).await {
        return Some(name);
    }
    match state.payments.coupon_name(provider_id).await {
        Ok(Some(name)) => {
            state.coupon_names.insert(coupon.id, name.clone()).await;
            Some(name)
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(provider_coupon_id = %provider_id, error = %e, "error fetching provider coupon");
            None
        }
    }
}

fn invalid_coupon_body(err: CouponError) -> AppError {
    let message = match err {
        CouponError::InvalidPercentage(_) => "Invalid Coupon Discount",
        CouponError::EmptyCode => "Invalid Body",
        _ => "Invalid Coupon Requirement",
    };
    tracing::debug!(reason = %err, "rejected coupon");
    AppError::InvalidRequest(message.to_string())
}
