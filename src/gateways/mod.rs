// ============================================================================
// Gateways - narrow capability interfaces over the backing services
// ============================================================================
//
// - OrderStore:    insert / fetch against the durable store (Postgres)
// - CacheGateway:  put / get / delete against the key-value cache (Redis)
//
// The coordinator only ever sees these traits, so tests can swap in the
// in-memory fakes from `memory`.
//
// ============================================================================

mod errors;
mod postgres;
mod redis_cache;
mod retrying;

#[cfg(test)]
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::models::{InsertReceipt, NewOrder, Order};

pub use errors::{CacheError, StoreError};
pub use postgres::PostgresOrderStore;
pub use redis_cache::RedisCache;
pub use retrying::RetryingOrderStore;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a draft and report the id and timestamp the store assigned.
    async fn insert(&self, order: &NewOrder) -> Result<InsertReceipt, StoreError>;

    /// Fetch the full record, or `StoreError::NotFound` when no row exists.
    async fn fetch_by_id(&self, id: i64) -> Result<Order, StoreError>;
}

#[async_trait]
pub trait CacheGateway: Send + Sync {
    /// Store `value` under `key`, replacing any previous entry, expiring after `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Returns `CacheError::Miss` for absent or expired keys.
    async fn get(&self, key: &str) -> Result<String, CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// JSON encoding on top of any [`CacheGateway`].
#[async_trait]
pub trait CacheGatewayExt: CacheGateway {
    async fn put_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + Sync,
    {
        let payload = serde_json::to_string(value)?;
        self.put(key, &payload, ttl).await
    }

    async fn get_json<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        let payload = self.get(key).await?;
        Ok(serde_json::from_str(&payload)?)
    }
}

impl<C: CacheGateway + ?Sized> CacheGatewayExt for C {}
