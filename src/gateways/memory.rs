//! In-memory gateway fakes with call counters and switchable outages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{InsertReceipt, NewOrder, Order};

use super::{CacheError, CacheGateway, OrderStore, StoreError};

fn unavailable_store() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

fn unreachable_cache() -> CacheError {
    CacheError::Backend(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection refused",
    )))
}

pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<i64, Order>>,
    next_id: AtomicI64,
    down: AtomicBool,
    inserts: AtomicUsize,
    fetches: AtomicUsize,
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            down: AtomicBool::new(false),
            inserts: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a row directly, bypassing `insert` and its counter.
    pub fn seed(&self, order: Order) {
        self.next_id.fetch_max(order.id + 1, Ordering::SeqCst);
        self.orders.lock().unwrap().insert(order.id, order);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &NewOrder) -> Result<InsertReceipt, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable_store());
        }

        let receipt = InsertReceipt {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            created_at: Utc::now(),
        };
        let stored = order.clone().into_order(receipt);
        self.orders.lock().unwrap().insert(stored.id, stored);
        Ok(receipt)
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Order, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable_store());
        }

        self.orders
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    unreachable: AtomicBool,
    puts: AtomicUsize,
    put_ttls: Mutex<Vec<Duration>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Raw stored payload, ignoring expiry.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).map(|(value, _)| value.clone())
    }

    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// TTL passed to each `put`, in call order, including failed ones.
    pub fn put_ttls(&self) -> Vec<Duration> {
        self.put_ttls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheGateway for InMemoryCache {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.put_ttls.lock().unwrap().push(ttl);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(unreachable_cache());
        }
        self.insert_raw(key, value, ttl);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, CacheError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(unreachable_cache());
        }

        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Ok(value.clone()),
            Some(_) => {
                entries.remove(key);
                Err(CacheError::Miss)
            }
            None => Err(CacheError::Miss),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(unreachable_cache());
        }
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::CacheGatewayExt;

    fn order(id: i64) -> Order {
        Order {
            id,
            customer_name: "Alice".to_string(),
            product_name: "Phone".to_string(),
            quantity: 2,
            status: "Pending".to_string(),
            created_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_repeated_put_is_idempotent() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(300);

        cache.put_json("order:1", &order(1), ttl).await.unwrap();
        let after_one = cache.raw("order:1");

        cache.put("order:1", after_one.as_deref().unwrap(), ttl).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.raw("order:1"), after_one);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = InMemoryCache::new();
        cache.insert_raw("order:2", "{}", Duration::ZERO);

        let err = cache.get("order:2").await.unwrap_err();
        assert!(err.is_miss());
    }

    #[tokio::test]
    async fn test_delete_of_missing_key_succeeds() {
        let cache = InMemoryCache::new();
        assert!(cache.delete("order:404").await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_cache_is_not_a_miss() {
        let cache = InMemoryCache::new();
        cache.set_unreachable(true);

        let err = cache.get("order:1").await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_codec_error() {
        let cache = InMemoryCache::new();
        cache.insert_raw("order:3", "not json", Duration::from_secs(60));

        let err = cache.get_json::<Order>("order:3").await.unwrap_err();
        assert!(matches!(err, CacheError::Codec(_)));
    }

    #[tokio::test]
    async fn test_store_assigns_sequential_ids() {
        let store = InMemoryOrderStore::new();
        let draft = NewOrder {
            customer_name: "Bob".to_string(),
            product_name: "Laptop".to_string(),
            quantity: 1,
            status: "Pending".to_string(),
        };

        let first = store.insert(&draft).await.unwrap();
        let second = store.insert(&draft).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.fetch_by_id(2).await.unwrap().customer_name, "Bob");
        assert!(matches!(store.fetch_by_id(3).await, Err(StoreError::NotFound(3))));
    }
}
