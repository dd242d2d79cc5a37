use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Bounded TTL cache of payment-provider coupon descriptions, keyed by shop
/// coupon id. When full, expired entries go first, then the soonest to expire.
pub struct CouponNameCache {
    store: RwLock<HashMap<i64, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl CouponNameCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            store: RwLock::new(HashMap::with_capacity(capacity)),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub async fn get(&self, coupon_id: i64) -> Option<String> {
        let store = self.store.read().await;
        store
            .get(&coupon_id)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    pub async fn insert(&self, coupon_id: i64, name: String) {
        let now = Instant::now();
        let mut store = self.store.write().await;
        if !store.contains_key(&coupon_id) && store.len() >= self.capacity {
            store.retain(|_, entry| !entry.is_expired(now));
            if store.len() >= self.capacity {
                if let Some(oldest) = store.iter().min_by_key(|(_, e)| e.expires_at).map(|(k, _)| *k) {
                    store.remove(&oldest);
                }
            }
        }
        store.insert(coupon_id, CacheEntry { value: name, expires_at: now + self.ttl });
    }

    pub async fn invalidate(&self, coupon_id: i64) {
        self.store.write().await.remove(&coupon_id);
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let cache = CouponNameCache::new(2, Duration::from_secs(60));
        cache.insert(1, "one".into()).await;
        cache.insert(2, "two".into()).await;
        cache.insert(3, "three".into()).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get(1).await, None);
        assert_eq!(cache.get(3).await.as_deref(), Some("three"));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = CouponNameCache::new(4, Duration::from_millis(20));
        cache.insert(1, "one".into()).await;
        assert_eq!(cache.get(1).await.as_deref(), Some("one"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get(1).await, None);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = CouponNameCache::new(4, Duration::from_secs(60));
        cache.insert(7, "seven".into()).await;
        cache.invalidate(7).await;
        assert_eq!(cache.get(7).await, None);
    }
}
