use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One line on the hosted checkout page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutLine {
    pub name: String,
    /// Chosen variant text; empty for products without variants.
    pub description: String,
    pub image_url: String,
    /// Unit price in the smallest currency unit.
    pub unit_amount: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub order_id: String,
    pub customer_email: String,
    pub lines: Vec<CheckoutLine>,
    pub provider_coupon_id: Option<String>,
    /// Landing page the buyer returns to; the provider appends `?session_id=<ref>`.
    pub complete_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Payment reference, the idempotency key for fulfillment.
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Complete,
    Expired,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

/// Authoritative state of a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDetails {
    pub id: String,
    pub status: SessionStatus,
    pub payment_status: SessionPaymentStatus,
    pub expires_at: Option<i64>,
    /// Provider coupon applied to the session, if any.
    pub discount_coupon_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Payment provider unreachable: {0}")]
    Transport(String),
    #[error("Unexpected payment provider response: {0}")]
    InvalidResponse(String),
}

/// Hosted-checkout payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    async fn get_session(&self, session_id: &str) -> Result<SessionDetails, PaymentError>;

    async fn expire_session(&self, session_id: &str) -> Result<(), PaymentError>;

    /// Creates or updates the provider-side coupon for a shop coupon and
    /// returns its provider id. `existing` is the id stored so far.
    async fn upsert_coupon(
        &self,
        existing: Option<&str>,
        name: &str,
        percent_off: i64,
    ) -> Result<String, PaymentError>;

    /// Display name of a provider coupon, `None` if the provider has none.
    async fn coupon_name(&self, coupon_id: &str) -> Result<Option<String>, PaymentError>;
}
