use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use quickshop_core::payment::{
    CheckoutLine, CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentProvider,
    SessionDetails, SessionPaymentStatus, SessionStatus,
};
use quickshop_core::repository::OrderRepository;
use quickshop_core::{NewOrder, StoreError};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::models::PricedOrder;
use crate::order_id::{generate_order_id, OrderIdGenerator, RandomOrderIds, MAX_ID_ATTEMPTS};

/// Path of the landing page the buyer is sent back to after paying.
pub const CHECKOUT_COMPLETE_PATH: &str = "/api/v0/checkout/complete";

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Could not allocate an order id after {0} attempts")]
    TooManyCollisions(usize),
    #[error("Order storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("Checkout session creation failed: {0}")]
    Payment(#[from] PaymentError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOutcome {
    pub order_id: String,
    pub payment_reference: String,
    pub checkout_url: String,
}

/// Persists priced orders and hands the buyer over to the payment provider.
pub struct CheckoutOrchestrator {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentProvider>,
    ids: Arc<dyn OrderIdGenerator>,
    frontend_url: String,
}

impl CheckoutOrchestrator {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentProvider>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            payments,
            ids: Arc::new(RandomOrderIds),
            frontend_url: frontend_url.into(),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn OrderIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Stores the order, opens a hosted checkout session and links the two.
    ///
    /// Failures after the order is stored leave it pending without a payment
    /// reference; it is never rolled back.
    pub async fn checkout(
        &self,
        order: PricedOrder,
        sale_period_id: Option<i64>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let PricedOrder { buyer, items, coupon } = order;
        let mut new_order = NewOrder {
            id: String::new(),
            buyer,
            coupon_id: coupon.as_ref().map(|c| c.id),
            sale_period_id,
            items,
        };

        let mut stored = false;
        for attempt in 1..=MAX_ID_ATTEMPTS {
            new_order.id = self.ids.next_id();
            match self.orders.create_order(&new_order).await {
                Ok(()) => {
                    stored = true;
                    break;
                }
                Err(StoreError::Conflict(reason)) => {
                    warn!(order_id = %new_order.id, attempt, %reason, "order id unavailable, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        if !stored {
            error!("failing checkout due to too many order id collisions");
            return Err(CheckoutError::TooManyCollisions(MAX_ID_ATTEMPTS));
        }
        let order_id = new_order.id;

        let request = CheckoutSessionRequest {
            order_id: order_id.clone(),
            customer_email: new_order.buyer.email,
            lines: new_order
                .items
                .iter()
                .map(|item| CheckoutLine {
                    name: item.product_name.clone(),
                    description: item.variant.clone(),
                    image_url: item.image_url.clone(),
                    unit_amount: item.unit_price,
                    quantity: item.amount,
                })
                .collect(),
            provider_coupon_id: coupon.and_then(|c| c.provider_id),
            complete_url: format!("{}{}", self.frontend_url, CHECKOUT_COMPLETE_PATH),
            cancel_url: self.frontend_url.clone(),
        };
        let session = self.payments.create_checkout_session(request).await.map_err(|e| {
            error!(order_id = %order_id, error = %e, "error creating checkout session");
            e
        })?;

        self.orders.associate_payment(&order_id, &session.id).await.map_err(|e| {
            error!(order_id = %order_id, session_id = %session.id, error = %e, "error associating order");
            e
        })?;

        info!(order_id = %order_id, session_id = %session.id, "checkout session created");
        Ok(CheckoutOutcome {
            order_id,
            payment_reference: session.id,
            checkout_url: session.url,
        })
    }
}

/// Stand-in provider used when no payment provider is configured.
///
/// Sessions redirect straight to the completion page and always report as
/// paid, so orders can be placed and fulfilled end to end without credentials.
#[derive(Default)]
pub struct OfflinePaymentProvider {
    coupons: Mutex<HashMap<String, String>>,
}

impl OfflinePaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentProvider for OfflinePaymentProvider {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let id = format!("nonstripe_mock_{}", generate_order_id(&mut rand::thread_rng()));
        warn!(order_id = %request.order_id, "skipping checkout session creation as no payment provider is configured");
        Ok(CheckoutSession {
            url: format!("{}?session_id={}", request.complete_url, id),
            id,
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionDetails, PaymentError> {
        warn!(session_id = %session_id, "skipping payment validation as no payment provider is configured");
        Ok(SessionDetails {
            id: session_id.to_string(),
            status: SessionStatus::Complete,
            payment_status: SessionPaymentStatus::Paid,
            expires_at: None,
            discount_coupon_id: None,
        })
    }

    async fn expire_session(&self, _session_id: &str) -> Result<(), PaymentError> {
        Ok(())
    }

    async fn upsert_coupon(
        &self,
        existing: Option<&str>,
        name: &str,
        _percent_off: i64,
    ) -> Result<String, PaymentError> {
        let id = match existing {
            Some(id) => id.to_string(),
            None => format!("mock_stripe_coupon_{}", generate_order_id(&mut rand::thread_rng())),
        };
        self.coupons.lock().await.insert(id.clone(), name.to_string());
        Ok(id)
    }

    async fn coupon_name(&self, coupon_id: &str) -> Result<Option<String>, PaymentError> {
        Ok(self.coupons.lock().await.get(coupon_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PricedOrder;
    use quickshop_catalog::LineItem;
    use quickshop_core::Buyer;
    use quickshop_store::memory::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands out a fixed sequence of ids, then repeats the last one.
    struct ScriptedIds {
        ids: Vec<&'static str>,
        next: AtomicUsize,
    }

    impl OrderIdGenerator for ScriptedIds {
        fn next_id(&self) -> String {
            let i = self.next.fetch_add(1, Ordering::SeqCst).min(self.ids.len() - 1);
            self.ids[i].to_string()
        }
    }

    fn scripted(ids: &[&'static str]) -> Arc<ScriptedIds> {
        Arc::new(ScriptedIds { ids: ids.to_vec(), next: AtomicUsize::new(0) })
    }

    fn priced() -> PricedOrder {
        PricedOrder {
            buyer: Buyer {
                name: "Tan Ah Kow".to_string(),
                matric_number: "U1234567A".to_string(),
                email: "tan@e.ntu.edu.sg".to_string(),
            },
            items: vec![LineItem {
                product_id: "1".to_string(),
                product_name: "T-Shirt".to_string(),
                variant: "M".to_string(),
                image_url: "shirt.png".to_string(),
                amount: 2,
                unit_price: 1200,
            }],
            coupon: None,
        }
    }

    #[tokio::test]
    async fn test_offline_checkout_associates_reference() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = CheckoutOrchestrator::new(store.clone(), Arc::new(OfflinePaymentProvider::new()), "https://shop.test")
            .with_id_generator(scripted(&["CD0001"]));

        let outcome = orchestrator.checkout(priced(), Some(1)).await.unwrap();
        assert_eq!(outcome.order_id, "CD0001");
        assert!(outcome.payment_reference.starts_with("nonstripe_mock_"));
        assert_eq!(
            outcome.checkout_url,
            format!("https://shop.test/api/v0/checkout/complete?session_id={}", outcome.payment_reference)
        );

        let order = store.get_order("CD0001").await.unwrap().unwrap();
        assert_eq!(order.payment_reference.as_deref(), Some(outcome.payment_reference.as_str()));
        assert_eq!(order.items.len(), 1);
    }

    #[tokio::test]
    async fn test_id_collision_retries_with_fresh_id() {
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(OfflinePaymentProvider::new());
        let first = CheckoutOrchestrator::new(store.clone(), payments.clone(), "https://shop.test")
            .with_id_generator(scripted(&["CD0001"]));
        first.checkout(priced(), None).await.unwrap();

        let second = CheckoutOrchestrator::new(store.clone(), payments, "https://shop.test")
            .with_id_generator(scripted(&["CD0001", "CD0001", "CD0002"]));
        let outcome = second.checkout(priced(), None).await.unwrap();
        assert_eq!(outcome.order_id, "CD0002");
    }

    #[tokio::test]
    async fn test_gives_up_after_five_collisions() {
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(OfflinePaymentProvider::new());
        CheckoutOrchestrator::new(store.clone(), payments.clone(), "https://shop.test")
            .with_id_generator(scripted(&["CD0001"]))
            .checkout(priced(), None)
            .await
            .unwrap();

        let ids = scripted(&["CD0001"]);
        let result = CheckoutOrchestrator::new(store, payments, "https://shop.test")
            .with_id_generator(ids.clone())
            .checkout(priced(), None)
            .await;
        assert!(matches!(result, Err(CheckoutError::TooManyCollisions(5))));
        assert_eq!(ids.next.load(Ordering::SeqCst), 5);
    }
}
