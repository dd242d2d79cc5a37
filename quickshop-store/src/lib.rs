pub mod app_config;
pub mod database;
pub mod catalog_repo;
pub mod coupon_repo;
pub mod order_repo;
pub mod shop_repo;
pub mod memory;
pub mod stripe;
pub mod cache;
pub mod redis_repo;

pub use app_config::Config;
pub use cache::CouponNameCache;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use redis_repo::RedisClient;
pub use stripe::{StripeClient, StripeConfig, WebhookError, WebhookEvent, WebhookVerifier};
