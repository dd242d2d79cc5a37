use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quickshop_catalog::{Coupon, Product};

use crate::order::{NewOrder, Order};
use crate::shop::{SalePeriod, StoreClosure};
use crate::StoreResult;

/// Repository trait for the product catalog
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_products(
        &self,
        sale_period_id: i64,
        include_disabled: bool,
    ) -> StoreResult<Vec<Product>>;

    /// Inserts when `product.id` is empty, updates otherwise. Returns the id.
    async fn save_product(&self, product: &Product) -> StoreResult<String>;
}

#[async_trait]
pub trait SalePeriodRepository: Send + Sync {
    async fn list_sale_periods(&self) -> StoreResult<Vec<SalePeriod>>;

    async fn save_sale_period(&self, period: &SalePeriod) -> StoreResult<i64>;
}

#[async_trait]
pub trait StoreClosureRepository: Send + Sync {
    async fn list_closures(&self) -> StoreResult<Vec<StoreClosure>>;

    async fn save_closure(&self, closure: &StoreClosure) -> StoreResult<i64>;

    async fn delete_closure(&self, id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>>;

    /// Enabled coupons flagged public.
    async fn list_public_coupons(&self) -> StoreResult<Vec<Coupon>>;

    async fn get_coupon(&self, id: i64) -> StoreResult<Option<Coupon>>;

    async fn enabled_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>>;

    async fn save_coupon(&self, coupon: &Coupon) -> StoreResult<i64>;
}

/// Result of recording a payment against a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCompletion {
    pub order_id: String,
    /// False when the order was already paid and nothing changed.
    pub newly_paid: bool,
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts the order row and its items atomically. A taken id or a failed
    /// commit is reported as [`crate::StoreError::Conflict`].
    async fn create_order(&self, order: &NewOrder) -> StoreResult<()>;

    async fn associate_payment(&self, order_id: &str, payment_reference: &str) -> StoreResult<()>;

    /// Sets the payment time of the order holding `payment_reference` unless
    /// it is already set.
    async fn complete_checkout(
        &self,
        payment_reference: &str,
        paid_at: DateTime<Utc>,
        provider_coupon_id: Option<&str>,
    ) -> StoreResult<PaymentCompletion>;

    /// Marks the order holding `payment_reference` as expired. Returns its id.
    async fn expire_checkout(&self, payment_reference: &str, at: DateTime<Utc>) -> StoreResult<String>;

    async fn get_order(&self, id: &str) -> StoreResult<Option<Order>>;

    async fn set_cancelled(&self, id: &str) -> StoreResult<()>;

    async fn mark_collected(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()>;

    /// Paid, uncancelled orders of a sale period.
    async fn list_paid_orders(&self, sale_period_id: i64) -> StoreResult<Vec<Order>>;
}
