use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use quickshop_order::{FulfillmentError, Reconciliation};
use quickshop_store::WebhookError;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// Largest webhook payload accepted.
pub const WEBHOOK_BODY_LIMIT: usize = 65536;

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

const COMPLETE_FAILED: &str =
    "Failed to complete checkout. We will still process your order if your payment was successful.";

#[derive(Debug, Deserialize)]
pub struct CompleteQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/checkout/stripe",
            post(stripe_webhook).layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT)),
        )
        .route("/checkout/complete", get(checkout_complete))
}

/// Payment provider callback. Only checkout outcomes are acted on.
async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    let event = state
        .webhook_verifier
        .construct_event(&body, signature, Utc::now().timestamp())
        .map_err(|e| {
            tracing::warn!(error = %e, "rejected webhook");
            match e {
                WebhookError::InvalidPayload(_) => AppError::invalid_body(),
                _ => AppError::InvalidSignature,
            }
        })?;

    if !event.is_checkout_outcome() {
        tracing::debug!(event_type = %event.event_type, "ignoring webhook event");
        return Ok(StatusCode::OK);
    }
    let session_id = event.session_id.ok_or_else(AppError::invalid_body)?;

    match state.reconciler.reconcile(&session_id).await {
        Ok(outcome) => {
            tracing::debug!(session_id = %session_id, order_id = %outcome.order_id(), "webhook reconciled");
            Ok(StatusCode::OK)
        }
        Err(FulfillmentError::NotYetPaid { .. }) => {
            tracing::info!(session_id = %session_id, "checkout session not paid yet, ignoring");
            Ok(StatusCode::OK)
        }
        Err(e) => Err(e.into()),
    }
}

/// Where the payment page sends the buyer back to.
async fn checkout_complete(
    State(state): State<AppState>,
    Query(query): Query<CompleteQuery>,
) -> Result<Redirect, AppError> {
    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Session ID not provided".to_string()))?;

    match state.reconciler.reconcile(&session_id).await {
        Ok(Reconciliation::Paid { order_id, .. }) => Ok(Redirect::temporary(&format!(
            "{}/orders/{}",
            state.shop.frontend_url, order_id
        ))),
        Ok(Reconciliation::Expired { order_id }) => {
            tracing::info!(session_id = %session_id, order_id = %order_id, "buyer returned from expired session");
            Err(AppError::PaymentNotCompleted(COMPLETE_FAILED.to_string()))
        }
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "error completing checkout");
            Err(AppError::PaymentNotCompleted(COMPLETE_FAILED.to_string()))
        }
    }
}
