use std::sync::Arc;
use std::time::Duration;

use quickshop_core::payment::PaymentProvider;
use quickshop_core::repository::{
    CouponRepository, OrderRepository, ProductRepository, SalePeriodRepository, StoreClosureRepository,
};
use quickshop_order::{CheckoutOrchestrator, FulfillmentReconciler, OrderBuilder, OrderManager};
use quickshop_store::{Config, CouponNameCache, MemoryStore, RedisClient, WebhookVerifier};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct ShopSettings {
    pub frontend_url: String,
    pub checkout_rate_limit_per_minute: i64,
}

/// Data access handles, one per repository trait.
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub sale_periods: Arc<dyn SalePeriodRepository>,
    pub closures: Arc<dyn StoreClosureRepository>,
    pub coupons: Arc<dyn CouponRepository>,
    pub orders: Arc<dyn OrderRepository>,
}

impl Repositories {
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            products: store.clone(),
            sale_periods: store.clone(),
            closures: store.clone(),
            coupons: store.clone(),
            orders: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub products: Arc<dyn ProductRepository>,
    pub sale_periods: Arc<dyn SalePeriodRepository>,
    pub closures: Arc<dyn StoreClosureRepository>,
    pub coupons: Arc<dyn CouponRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub payments: Arc<dyn PaymentProvider>,
    pub builder: Arc<OrderBuilder>,
    pub orchestrator: Arc<CheckoutOrchestrator>,
    pub reconciler: Arc<FulfillmentReconciler>,
    pub manager: Arc<OrderManager>,
    pub webhook_verifier: Arc<WebhookVerifier>,
    pub coupon_names: Arc<CouponNameCache>,
    /// Rate limiting is off without redis.
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub shop: ShopSettings,
}

impl AppState {
    /// Wires the checkout services over the given repositories and provider.
    pub fn new(
        repos: Repositories,
        payments: Arc<dyn PaymentProvider>,
        redis: Option<Arc<RedisClient>>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let builder = OrderBuilder::new(&config.shop.matric_pattern, &config.shop.email_pattern)?;
        let orchestrator =
            CheckoutOrchestrator::new(repos.orders.clone(), payments.clone(), config.shop.frontend_url.clone());
        let reconciler = FulfillmentReconciler::new(repos.orders.clone(), payments.clone());
        let manager = OrderManager::new(repos.orders.clone(), payments.clone());

        Ok(Self {
            products: repos.products,
            sale_periods: repos.sale_periods,
            closures: repos.closures,
            coupons: repos.coupons,
            orders: repos.orders,
            payments,
            builder: Arc::new(builder),
            orchestrator: Arc::new(orchestrator),
            reconciler: Arc::new(reconciler),
            manager: Arc::new(manager),
            webhook_verifier: Arc::new(WebhookVerifier::new(
                config.payment.webhook_secret.clone(),
                config.payment.webhook_tolerance_seconds,
            )),
            coupon_names: Arc::new(CouponNameCache::new(
                config.shop.coupon_cache_capacity,
                Duration::from_secs(config.shop.coupon_cache_ttl_seconds),
            )),
            redis,
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
            },
            shop: ShopSettings {
                frontend_url: config.shop.frontend_url.clone(),
                checkout_rate_limit_per_minute: config.shop.checkout_rate_limit_per_minute,
            },
        })
    }
}
