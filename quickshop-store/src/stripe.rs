use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use quickshop_core::payment::{
    CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentProvider, SessionDetails,
    SessionPaymentStatus, SessionStatus,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API: &str = "https://api.stripe.com/v1";

#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub currency: String,
    pub timeout: Duration,
}

/// Stripe hosted-checkout client over the REST API.
#[derive(Clone)]
pub struct StripeClient {
    config: StripeConfig,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    status: Option<SessionStatus>,
    payment_status: SessionPaymentStatus,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    total_details: Option<TotalDetails>,
}

#[derive(Deserialize)]
struct TotalDetails {
    #[serde(default)]
    breakdown: Option<Breakdown>,
}

#[derive(Deserialize)]
struct Breakdown {
    #[serde(default)]
    discounts: Vec<AppliedDiscount>,
}

#[derive(Deserialize)]
struct AppliedDiscount {
    discount: DiscountObject,
}

#[derive(Deserialize)]
struct DiscountObject {
    coupon: CouponObject,
}

#[derive(Deserialize)]
struct CouponObject {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    percent_off: Option<f64>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        Ok(Self { config, client, base_url: STRIPE_API.to_string() })
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, PaymentError> {
        let response = request
            .basic_auth(&self.config.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "Stripe API error");
            return Err(PaymentError::Rejected { status: status.as_u16(), message });
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(format!("Failed to parse Stripe response: {}", e)))
    }

    async fn get_coupon(&self, coupon_id: &str) -> Result<CouponObject, PaymentError> {
        let url = format!("{}/coupons/{}", self.base_url, coupon_id);
        self.send(self.client.get(&url)).await
    }

    fn session_form(&self, request: &CheckoutSessionRequest) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), format!("{}?session_id={{CHECKOUT_SESSION_ID}}", request.complete_url)),
            ("cancel_url".into(), request.cancel_url.clone()),
            ("client_reference_id".into(), request.order_id.clone()),
            ("customer_email".into(), request.customer_email.clone()),
            (
                "payment_intent_data[description]".into(),
                format!("Your order ID is {}.", request.order_id),
            ),
        ];
        for (i, line) in request.lines.iter().enumerate() {
            let prefix = format!("line_items[{}]", i);
            form.push((format!("{}[price_data][currency]", prefix), self.config.currency.clone()));
            form.push((format!("{}[price_data][unit_amount]", prefix), line.unit_amount.to_string()));
            form.push((format!("{}[price_data][product_data][name]", prefix), line.name.clone()));
            if !line.image_url.is_empty() {
                form.push((format!("{}[price_data][product_data][images][0]", prefix), line.image_url.clone()));
            }
            if !line.description.is_empty() {
                form.push((format!("{}[price_data][product_data][description]", prefix), line.description.clone()));
            }
            form.push((format!("{}[quantity]", prefix), line.quantity.to_string()));
        }
        if let Some(coupon) = &request.provider_coupon_id {
            form.push(("discounts[0][coupon]".into(), coupon.clone()));
        }
        form
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/checkout/sessions", self.base_url);
        let form = self.session_form(&request);
        let session: SessionResponse = self.send(self.client.post(&url).form(&form)).await?;
        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::InvalidResponse("checkout session has no URL".into()))?;
        debug!(session_id = %session.id, "checkout session created");
        Ok(CheckoutSession { id: session.id, url: checkout_url })
    }

    #[instrument(skip(self))]
    async fn get_session(&self, session_id: &str) -> Result<SessionDetails, PaymentError> {
        let url = format!("{}/checkout/sessions/{}", self.base_url, session_id);
        let session: SessionResponse = self
            .send(self.client.get(&url).query(&[("expand[]", "total_details.breakdown")]))
            .await?;

        let discount_coupon_id = session
            .total_details
            .and_then(|t| t.breakdown)
            .and_then(|b| b.discounts.into_iter().next())
            .map(|d| d.discount.coupon.id);
        Ok(SessionDetails {
            id: session.id,
            status: session
                .status
                .ok_or_else(|| PaymentError::InvalidResponse("checkout session has no status".into()))?,
            payment_status: session.payment_status,
            expires_at: session.expires_at,
            discount_coupon_id,
        })
    }

    #[instrument(skip(self))]
    async fn expire_session(&self, session_id: &str) -> Result<(), PaymentError> {
        let url = format!("{}/checkout/sessions/{}/expire", self.base_url, session_id);
        let _: SessionResponse = self.send(self.client.post(&url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn upsert_coupon(
        &self,
        existing: Option<&str>,
        name: &str,
        percent_off: i64,
    ) -> Result<String, PaymentError> {
        if let Some(coupon_id) = existing.filter(|id| !id.is_empty()) {
            match self.get_coupon(coupon_id).await {
                Ok(coupon) if coupon.percent_off.map(|p| p as i64) == Some(percent_off) => {
                    if coupon.name.as_deref() == Some(name) {
                        debug!(coupon_id, "skipping update, name is equal");
                        return Ok(coupon.id);
                    }
                    let url = format!("{}/coupons/{}", self.base_url, coupon_id);
                    match self.send::<CouponObject>(self.client.post(&url).form(&[("name", name)])).await {
                        Ok(updated) => return Ok(updated.id),
                        Err(e) => warn!(coupon_id, error = %e, "error updating coupon, creating a new one"),
                    }
                }
                Ok(coupon) => {
                    debug!(coupon_id, old_percentage = ?coupon.percent_off, new_percentage = percent_off,
                        "discount percentage changed, creating a new coupon");
                }
                Err(e) => warn!(coupon_id, error = %e, "error fetching coupon, creating a new one"),
            }
        }

        let url = format!("{}/coupons", self.base_url);
        let form = [("name", name.to_string()), ("percent_off", percent_off.to_string())];
        let created: CouponObject = self.send(self.client.post(&url).form(&form)).await?;
        Ok(created.id)
    }

    async fn coupon_name(&self, coupon_id: &str) -> Result<Option<String>, PaymentError> {
        Ok(self.get_coupon(coupon_id).await?.name)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing or malformed Stripe-Signature header")]
    MalformedHeader,
    #[error("webhook timestamp outside the tolerance window")]
    StaleTimestamp,
    #[error("no signature matches the payload")]
    SignatureMismatch,
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Checkout-related webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub event_type: String,
    pub session_id: Option<String>,
}

impl WebhookEvent {
    pub fn is_checkout_outcome(&self) -> bool {
        matches!(self.event_type.as_str(), "checkout.session.completed" | "checkout.session.expired")
    }
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// Verifies `Stripe-Signature` headers: `t=<unix>,v1=<hex hmac>[,v1=...]`,
/// signed over `"{t}.{payload}"`.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_seconds: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_seconds: i64) -> Self {
        Self { secret: secret.into(), tolerance_seconds }
    }

    pub fn verify(&self, payload: &[u8], header: &str, now: i64) -> Result<(), WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut signatures: Vec<Vec<u8>> = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", v)) => timestamp = v.parse().ok(),
                Some(("v1", v)) => {
                    if let Ok(sig) = hex::decode(v) {
                        signatures.push(sig);
                    }
                }
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedHeader);
        }
        if (now - timestamp).abs() > self.tolerance_seconds {
            return Err(WebhookError::StaleTimestamp);
        }

        for signature in &signatures {
            let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
                .map_err(|_| WebhookError::SignatureMismatch)?;
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(payload);
            if mac.verify_slice(signature).is_ok() {
                return Ok(());
            }
        }
        Err(WebhookError::SignatureMismatch)
    }

    /// Verifies the payload and decodes the event it carries.
    pub fn construct_event(&self, payload: &[u8], header: &str, now: i64) -> Result<WebhookEvent, WebhookError> {
        self.verify(payload, header, now)?;
        let raw: RawEvent =
            serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
        Ok(WebhookEvent {
            event_type: raw.event_type,
            session_id: raw.data.object.get("id").and_then(|v| v.as_str()).map(str::to_string),
        })
    }
}
