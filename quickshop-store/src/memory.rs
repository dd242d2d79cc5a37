use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quickshop_catalog::{Coupon, Product};
use quickshop_core::repository::{
    CouponRepository, OrderRepository, PaymentCompletion, ProductRepository, SalePeriodRepository,
    StoreClosureRepository,
};
use quickshop_core::{NewOrder, Order, SalePeriod, StoreClosure, StoreError, StoreResult};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    products: Vec<Product>,
    sale_periods: Vec<SalePeriod>,
    closures: Vec<StoreClosure>,
    coupons: Vec<Coupon>,
    orders: HashMap<String, Order>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn order_by_reference(&mut self, reference: &str) -> Option<&mut Order> {
        self.orders
            .values_mut()
            .find(|o| o.payment_reference.as_deref() == Some(reference))
    }
}

/// Process-local implementation of every repository, used when no database
/// is configured and throughout the test suites. Each operation holds the
/// lock for its whole duration, so conditional updates are atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn list_products(&self, sale_period_id: i64, include_disabled: bool) -> StoreResult<Vec<Product>> {
        let inner = self.inner.read().await;
        Ok(inner
            .products
            .iter()
            .filter(|p| p.sale_period == sale_period_id && (p.enabled || include_disabled))
            .cloned()
            .collect())
    }

    async fn save_product(&self, product: &Product) -> StoreResult<String> {
        let mut inner = self.inner.write().await;
        if product.id.is_empty() {
            let mut product = product.clone();
            product.id = inner.next_id().to_string();
            let id = product.id.clone();
            inner.products.push(product);
            return Ok(id);
        }
        let slot = inner
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or(StoreError::NotFound)?;
        *slot = product.clone();
        Ok(product.id.clone())
    }
}

#[async_trait]
impl SalePeriodRepository for MemoryStore {
    async fn list_sale_periods(&self) -> StoreResult<Vec<SalePeriod>> {
        let mut periods = self.inner.read().await.sale_periods.clone();
        periods.sort_by_key(|p| p.start_time);
        Ok(periods)
    }

    async fn save_sale_period(&self, period: &SalePeriod) -> StoreResult<i64> {
        let mut inner = self.inner.write().await;
        match period.id {
            None => {
                let id = inner.next_id();
                inner.sale_periods.push(SalePeriod { id: Some(id), ..period.clone() });
                Ok(id)
            }
            Some(id) => {
                let slot = inner
                    .sale_periods
                    .iter_mut()
                    .find(|p| p.id == Some(id))
                    .ok_or(StoreError::NotFound)?;
                *slot = period.clone();
                Ok(id)
            }
        }
    }
}

#[async_trait]
impl StoreClosureRepository for MemoryStore {
    async fn list_closures(&self) -> StoreResult<Vec<StoreClosure>> {
        let mut closures = self.inner.read().await.closures.clone();
        closures.sort_by_key(|c| c.start_time);
        Ok(closures)
    }

    async fn save_closure(&self, closure: &StoreClosure) -> StoreResult<i64> {
        let mut inner = self.inner.write().await;
        match closure.id {
            None => {
                let id = inner.next_id();
                inner.closures.push(StoreClosure { id: Some(id), ..closure.clone() });
                Ok(id)
            }
            Some(id) => {
                let slot = inner
                    .closures
                    .iter_mut()
                    .find(|c| c.id == Some(id))
                    .ok_or(StoreError::NotFound)?;
                *slot = closure.clone();
                Ok(id)
            }
        }
    }

    async fn delete_closure(&self, id: i64) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let before = inner.closures.len();
        inner.closures.retain(|c| c.id != Some(id));
        if inner.closures.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CouponRepository for MemoryStore {
    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>> {
        Ok(self.inner.read().await.coupons.clone())
    }

    async fn list_public_coupons(&self) -> StoreResult<Vec<Coupon>> {
        let inner = self.inner.read().await;
        Ok(inner.coupons.iter().filter(|c| c.enabled && c.public).cloned().collect())
    }

    async fn get_coupon(&self, id: i64) -> StoreResult<Option<Coupon>> {
        let inner = self.inner.read().await;
        Ok(inner.coupons.iter().find(|c| c.id == id).cloned())
    }

    async fn enabled_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let inner = self.inner.read().await;
        Ok(inner.coupons.iter().find(|c| c.enabled && c.code == code).cloned())
    }

    async fn save_coupon(&self, coupon: &Coupon) -> StoreResult<i64> {
        let mut inner = self.inner.write().await;
        if inner.coupons.iter().any(|c| c.code == coupon.code && c.id != coupon.id) {
            return Err(StoreError::Conflict(format!("coupon code {:?} already exists", coupon.code)));
        }
        let mut stored = coupon.clone();
        stored.description = None;
        if coupon.id == 0 {
            stored.id = inner.next_id();
            let id = stored.id;
            inner.coupons.push(stored);
            return Ok(id);
        }
        let slot = inner
            .coupons
            .iter_mut()
            .find(|c| c.id == coupon.id)
            .ok_or(StoreError::NotFound)?;
        *slot = stored;
        Ok(coupon.id)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create_order(&self, order: &NewOrder) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order id {} is taken", order.id)));
        }
        inner.orders.insert(order.id.clone(), order.clone().into_order(Utc::now()));
        Ok(())
    }

    async fn associate_payment(&self, order_id: &str, payment_reference: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let order = inner.orders.get_mut(order_id).ok_or(StoreError::NotFound)?;
        order.payment_reference = Some(payment_reference.to_string());
        Ok(())
    }

    async fn complete_checkout(
        &self,
        payment_reference: &str,
        paid_at: DateTime<Utc>,
        provider_coupon_id: Option<&str>,
    ) -> StoreResult<PaymentCompletion> {
        let mut inner = self.inner.write().await;
        let order = inner.order_by_reference(payment_reference).ok_or(StoreError::NotFound)?;
        if order.payment_time.is_some() {
            return Ok(PaymentCompletion { order_id: order.id.clone(), newly_paid: false });
        }
        order.payment_time = Some(paid_at);
        if let Some(coupon) = provider_coupon_id {
            order.provider_coupon_id = Some(coupon.to_string());
        }
        Ok(PaymentCompletion { order_id: order.id.clone(), newly_paid: true })
    }

    async fn expire_checkout(&self, payment_reference: &str, at: DateTime<Utc>) -> StoreResult<String> {
        let mut inner = self.inner.write().await;
        let order = inner.order_by_reference(payment_reference).ok_or(StoreError::NotFound)?;
        order.expired_at.get_or_insert(at);
        Ok(order.id.clone())
    }

    async fn get_order(&self, id: &str) -> StoreResult<Option<Order>> {
        Ok(self.inner.read().await.orders.get(id).cloned())
    }

    async fn set_cancelled(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.orders.get_mut(id).ok_or(StoreError::NotFound)?.cancelled = true;
        Ok(())
    }

    async fn mark_collected(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.orders.get_mut(id).ok_or(StoreError::NotFound)?.collection_time = Some(at);
        Ok(())
    }

    async fn list_paid_orders(&self, sale_period_id: i64) -> StoreResult<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.sale_period_id == Some(sale_period_id) && o.payment_time.is_some() && !o.cancelled)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.payment_time);
        Ok(orders)
    }
}
