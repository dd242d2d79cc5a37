use std::sync::Arc;

use chrono::Utc;
use quickshop_core::payment::{PaymentError, PaymentProvider, SessionStatus};
use quickshop_core::repository::OrderRepository;
use quickshop_core::{OrderStatus, StoreError};
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum ManageError {
    #[error("Invalid order ID")]
    NotFound,
    #[error("error expiring checkout session: {0}")]
    Payment(#[from] PaymentError),
    #[error("error updating order: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ManageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ManageError::NotFound,
            other => ManageError::Store(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// The order was cancelled before; nothing changed.
    AlreadyCancelled,
}

/// Admin-driven transitions after checkout: cancel and collect.
pub struct OrderManager {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentProvider>,
}

impl OrderManager {
    pub fn new(orders: Arc<dyn OrderRepository>, payments: Arc<dyn PaymentProvider>) -> Self {
        Self { orders, payments }
    }

    /// Cancels an order.
    ///
    /// A still-open checkout session is expired at the provider first; if that
    /// fails the order is left untouched so the cancel can be retried.
    pub async fn cancel(&self, order_id: &str) -> Result<CancelOutcome, ManageError> {
        let order = self.orders.get_order(order_id).await?.ok_or(ManageError::NotFound)?;
        if order.cancelled {
            return Ok(CancelOutcome::AlreadyCancelled);
        }

        if let (OrderStatus::PendingPayment, Some(reference)) = (order.status(), &order.payment_reference) {
            let session = self.payments.get_session(reference).await.map_err(|e| {
                error!(order_id = %order_id, session_id = %reference, error = %e, "error fetching checkout session");
                e
            })?;
            if session.status == SessionStatus::Open {
                self.payments.expire_session(reference).await.map_err(|e| {
                    error!(order_id = %order_id, session_id = %reference, error = %e, "error expiring checkout session");
                    e
                })?;
            }
        }

        self.orders.set_cancelled(order_id).await?;
        info!(order_id = %order_id, "order cancelled");
        Ok(CancelOutcome::Cancelled)
    }

    pub async fn collect(&self, order_id: &str) -> Result<(), ManageError> {
        self.orders.mark_collected(order_id, Utc::now()).await?;
        info!(order_id = %order_id, "order collected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quickshop_catalog::LineItem;
    use quickshop_core::payment::{CheckoutSession, CheckoutSessionRequest, SessionDetails, SessionPaymentStatus};
    use quickshop_core::{Buyer, NewOrder};
    use quickshop_store::memory::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Open sessions whose expiry call can be made to fail.
    struct OpenSessions {
        fail_expire: bool,
        expired: AtomicUsize,
    }

    #[async_trait]
    impl PaymentProvider for OpenSessions {
        async fn create_checkout_session(&self, _: CheckoutSessionRequest) -> Result<CheckoutSession, PaymentError> {
            Err(PaymentError::Transport("unused".into()))
        }

        async fn get_session(&self, session_id: &str) -> Result<SessionDetails, PaymentError> {
            Ok(SessionDetails {
                id: session_id.to_string(),
                status: SessionStatus::Open,
                payment_status: SessionPaymentStatus::Unpaid,
                expires_at: None,
                discount_coupon_id: None,
            })
        }

        async fn expire_session(&self, _: &str) -> Result<(), PaymentError> {
            if self.fail_expire {
                return Err(PaymentError::Rejected { status: 500, message: "boom".into() });
            }
            self.expired.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn upsert_coupon(&self, _: Option<&str>, _: &str, _: i64) -> Result<String, PaymentError> {
            Err(PaymentError::Transport("unused".into()))
        }

        async fn coupon_name(&self, _: &str) -> Result<Option<String>, PaymentError> {
            Ok(None)
        }
    }

    async fn pending_order() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create_order(&NewOrder {
                id: "MN0001".to_string(),
                buyer: Buyer {
                    name: "Lim".to_string(),
                    matric_number: "U7654321B".to_string(),
                    email: "lim@ntu.edu.sg".to_string(),
                },
                coupon_id: None,
                sale_period_id: Some(1),
                items: vec![LineItem {
                    product_id: "1".to_string(),
                    product_name: "Tote".to_string(),
                    variant: String::new(),
                    image_url: String::new(),
                    amount: 1,
                    unit_price: 1500,
                }],
            })
            .await
            .unwrap();
        store.associate_payment("MN0001", "cs_open").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_cancel_expires_open_session_first() {
        let store = pending_order().await;
        let provider = Arc::new(OpenSessions { fail_expire: false, expired: AtomicUsize::new(0) });
        let manager = OrderManager::new(store.clone(), provider.clone());

        assert_eq!(manager.cancel("MN0001").await.unwrap(), CancelOutcome::Cancelled);
        assert_eq!(provider.expired.load(Ordering::SeqCst), 1);
        assert!(store.get_order("MN0001").await.unwrap().unwrap().cancelled);

        assert_eq!(manager.cancel("MN0001").await.unwrap(), CancelOutcome::AlreadyCancelled);
        assert_eq!(provider.expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_order_untouched() {
        let store = pending_order().await;
        let provider = Arc::new(OpenSessions { fail_expire: true, expired: AtomicUsize::new(0) });
        let manager = OrderManager::new(store.clone(), provider);

        assert!(matches!(manager.cancel("MN0001").await, Err(ManageError::Payment(_))));
        assert!(!store.get_order("MN0001").await.unwrap().unwrap().cancelled);
    }

    #[tokio::test]
    async fn test_collect_and_unknown_order() {
        let store = pending_order().await;
        let manager = OrderManager::new(store.clone(), Arc::new(OpenSessions { fail_expire: false, expired: AtomicUsize::new(0) }));

        manager.collect("MN0001").await.unwrap();
        assert!(store.get_order("MN0001").await.unwrap().unwrap().collection_time.is_some());
        assert!(matches!(manager.collect("XX9999").await, Err(ManageError::NotFound)));
        assert!(matches!(manager.cancel("XX9999").await, Err(ManageError::NotFound)));
    }
}
