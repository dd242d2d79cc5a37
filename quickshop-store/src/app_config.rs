use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub shop: ShopConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Without a URL the service runs on the in-memory store.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None, max_connections: default_max_connections() }
    }
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// Enables checkout rate limiting when set.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Without a key checkout runs against the offline provider.
    pub stripe_secret_key: Option<String>,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_tolerance")]
    pub webhook_tolerance_seconds: i64,
}

fn default_currency() -> String { "sgd".into() }
fn default_timeout() -> u64 { 10 }
fn default_tolerance() -> i64 { 300 }

#[derive(Debug, Deserialize, Clone)]
pub struct ShopConfig {
    pub frontend_url: String,
    pub matric_pattern: String,
    pub email_pattern: String,
    #[serde(default = "default_rate_limit")]
    pub checkout_rate_limit_per_minute: i64,
    #[serde(default = "default_cache_capacity")]
    pub coupon_cache_capacity: usize,
    #[serde(default = "default_cache_ttl")]
    pub coupon_cache_ttl_seconds: u64,
}

fn default_rate_limit() -> i64 { 10 }
fn default_cache_capacity() -> usize { 256 }
fn default_cache_ttl() -> u64 { 600 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `QUICKSHOP__PAYMENT__STRIPE_SECRET_KEY=sk_live_...`
            .add_source(config::Environment::with_prefix("QUICKSHOP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
