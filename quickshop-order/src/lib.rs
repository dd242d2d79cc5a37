pub mod models;
pub mod builder;
pub mod order_id;
pub mod orchestrator;
pub mod fulfillment;
pub mod manager;

pub use models::{CheckoutRequest, PricedOrder};
pub use builder::{OrderBuilder, OrderError};
pub use orchestrator::{CheckoutError, CheckoutOrchestrator, CheckoutOutcome, OfflinePaymentProvider};
pub use fulfillment::{FulfillmentError, FulfillmentReconciler, Reconciliation};
pub use manager::{CancelOutcome, ManageError, OrderManager};
