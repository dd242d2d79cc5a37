use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use quickshop_core::payment::PaymentError;
use quickshop_core::{StoreClosure, StoreError};
use quickshop_order::{CheckoutError, FulfillmentError, ManageError, OrderError};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    InvalidRequest(String),
    InvalidCoupon,
    NotFound(String),
    Unauthorized,
    Forbidden,
    StoreClosed(StoreClosure),
    InvalidSignature,
    PaymentNotCompleted(String),
    PaymentProvider(String),
    OrderNotAssociated(String),
    Internal(anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::InvalidCoupon => "invalid_coupon",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::StoreClosed(_) => "store_closed",
            AppError::InvalidSignature => "invalid_signature",
            AppError::PaymentNotCompleted(_) => "payment_not_completed",
            AppError::PaymentProvider(_) => "payment_provider_error",
            AppError::OrderNotAssociated(_) => "order_not_associated",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn invalid_body() -> Self {
        AppError::InvalidRequest("Invalid Body".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InvalidCoupon => (StatusCode::BAD_REQUEST, OrderError::InvalidCoupon.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::StoreClosed(closure) => {
                let body = Json(json!({
                    "type": "store_closure",
                    "code": code,
                    "end_time": closure.seconds_remaining(Utc::now()),
                    "message": closure.message,
                    "show_order_check": closure.show_order_check,
                }));
                return (StatusCode::SERVICE_UNAVAILABLE, body).into_response();
            }
            AppError::InvalidSignature => (StatusCode::BAD_REQUEST, "Invalid webhook signature".to_string()),
            AppError::PaymentNotCompleted(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PaymentProvider(msg) => {
                tracing::error!("Payment provider error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment provider unavailable".to_string())
            }
            AppError::OrderNotAssociated(session_id) => {
                tracing::warn!(session_id = %session_id, "checkout session has no order yet");
                (StatusCode::SERVICE_UNAVAILABLE, "Order not yet associated".to_string())
            }
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.into())
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        AppError::PaymentProvider(err.to_string())
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidCoupon => AppError::InvalidCoupon,
            other => AppError::InvalidRequest(other.to_string()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Payment(e) => e.into(),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::NotYetPaid { .. } => AppError::PaymentNotCompleted(err.to_string()),
            FulfillmentError::UnknownSession(session_id) => AppError::OrderNotAssociated(session_id),
            FulfillmentError::Payment(e) => e.into(),
            FulfillmentError::Store(e) => e.into(),
        }
    }
}

impl From<ManageError> for AppError {
    fn from(err: ManageError) -> Self {
        match err {
            ManageError::NotFound => AppError::NotFound(err.to_string()),
            ManageError::Payment(e) => e.into(),
            ManageError::Store(e) => e.into(),
        }
    }
}
