use std::sync::Arc;

use chrono::Utc;
use quickshop_core::payment::{PaymentError, PaymentProvider, SessionPaymentStatus, SessionStatus};
use quickshop_core::repository::OrderRepository;
use quickshop_core::StoreError;
use tracing::{debug, info};

/// Terminal outcome of reconciling a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Paid { order_id: String, newly_paid: bool },
    Expired { order_id: String },
}

impl Reconciliation {
    pub fn order_id(&self) -> &str {
        match self {
            Reconciliation::Paid { order_id, .. } | Reconciliation::Expired { order_id } => order_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("payment status of checkout session {session_id} is unpaid, expiry time {expires_at:?}")]
    NotYetPaid { session_id: String, expires_at: Option<i64> },
    #[error("no order is associated with checkout session {0}")]
    UnknownSession(String),
    #[error("failed to fetch checkout session: {0}")]
    Payment(#[from] PaymentError),
    #[error("error updating order: {0}")]
    Store(StoreError),
}

/// Settles orders from the payment provider's view of a checkout session.
///
/// Webhook deliveries and the buyer's redirect both land here; running it any
/// number of times for the same session leaves the order in the same state.
pub struct FulfillmentReconciler {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentProvider>,
}

impl FulfillmentReconciler {
    pub fn new(orders: Arc<dyn OrderRepository>, payments: Arc<dyn PaymentProvider>) -> Self {
        Self { orders, payments }
    }

    pub async fn reconcile(&self, session_id: &str) -> Result<Reconciliation, FulfillmentError> {
        let session = self.payments.get_session(session_id).await?;

        if session.status == SessionStatus::Expired {
            debug!(session_id = %session_id, "expiring checkout session");
            let order_id = self
                .orders
                .expire_checkout(session_id, Utc::now())
                .await
                .map_err(|e| store_error(session_id, e))?;
            return Ok(Reconciliation::Expired { order_id });
        }
        if session.payment_status == SessionPaymentStatus::Unpaid {
            return Err(FulfillmentError::NotYetPaid {
                session_id: session_id.to_string(),
                expires_at: session.expires_at,
            });
        }

        let completion = self
            .orders
            .complete_checkout(session_id, Utc::now(), session.discount_coupon_id.as_deref())
            .await
            .map_err(|e| store_error(session_id, e))?;
        if completion.newly_paid {
            info!(order_id = %completion.order_id, session_id = %session_id, "order paid");
        } else {
            debug!(order_id = %completion.order_id, session_id = %session_id, "order already paid");
        }
        Ok(Reconciliation::Paid {
            order_id: completion.order_id,
            newly_paid: completion.newly_paid,
        })
    }
}

fn store_error(session_id: &str, err: StoreError) -> FulfillmentError {
    match err {
        StoreError::NotFound => FulfillmentError::UnknownSession(session_id.to_string()),
        other => FulfillmentError::Store(other),
    }
}
