use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quickshop_api::{app, AppState, Repositories};
use quickshop_core::payment::PaymentProvider;
use quickshop_order::OfflinePaymentProvider;
use quickshop_store::catalog_repo::StoreProductRepository;
use quickshop_store::coupon_repo::StoreCouponRepository;
use quickshop_store::order_repo::StoreOrderRepository;
use quickshop_store::shop_repo::StoreShopRepository;
use quickshop_store::{Config, DbClient, MemoryStore, RedisClient, StripeClient, StripeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickshop_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting QuickShop API on port {}", config.server.port);

    // Database Connection
    let repos = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .expect("Failed to connect to database");
            db.migrate().await.expect("Failed to run migrations");
            let shop = Arc::new(StoreShopRepository::new(db.pool.clone()));
            Repositories {
                products: Arc::new(StoreProductRepository::new(db.pool.clone())),
                sale_periods: shop.clone(),
                closures: shop,
                coupons: Arc::new(StoreCouponRepository::new(db.pool.clone())),
                orders: Arc::new(StoreOrderRepository::new(db.pool.clone())),
            }
        }
        None => {
            tracing::warn!("no database configured, orders are kept in memory only");
            Repositories::in_memory(Arc::new(MemoryStore::new()))
        }
    };

    // Payment Provider
    let payments: Arc<dyn PaymentProvider> = match &config.payment.stripe_secret_key {
        Some(key) if !key.is_empty() => Arc::new(
            StripeClient::new(StripeConfig {
                secret_key: key.clone(),
                currency: config.payment.currency.clone(),
                timeout: Duration::from_secs(config.payment.timeout_seconds),
            })
            .expect("Failed to create Stripe client"),
        ),
        _ => {
            tracing::warn!("no Stripe key configured, checkouts are marked paid without payment");
            Arc::new(OfflinePaymentProvider::new())
        }
    };

    // Redis Connection
    let redis = match &config.redis.url {
        Some(url) => Some(Arc::new(RedisClient::new(url).expect("Invalid redis URL"))),
        None => {
            tracing::warn!("no redis configured, checkout is not rate limited");
            None
        }
    };

    let app_state = AppState::new(repos, payments, redis, &config).expect("Failed to build app state");
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>()
    ).await.unwrap();
}
