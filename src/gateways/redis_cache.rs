use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::config::RedisConfig;

use super::{CacheError, CacheGateway};

// ============================================================================
// Redis Cache Gateway
// ============================================================================
//
// One multiplexed connection shared by every request. It is opened on first
// use and dropped after an I/O failure or timeout, so the next call
// reconnects instead of reusing a dead socket. Every call, connecting
// included, is bounded by `timeout` regardless of how many run at once.
//
// ============================================================================

pub struct RedisCache {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    timeout: Duration,
}

impl RedisCache {
    pub fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.connection_info())?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
            timeout: config.timeout(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        if let Some(conn) = self.connection.lock().await.as_ref() {
            return Ok(conn.clone());
        }

        // The slot is not locked while connecting: concurrent callers each
        // make their own bounded attempt and the first one stored wins.
        let conn = self.bounded(self.client.get_multiplexed_async_connection()).await?;

        let mut slot = self.connection.lock().await;
        match slot.as_ref() {
            Some(existing) => Ok(existing.clone()),
            None => {
                tracing::info!("Connected to Redis");
                *slot = Some(conn.clone());
                Ok(conn)
            }
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CacheError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }

    /// Forget the shared connection when the failure means it is unusable.
    async fn observe<T>(&self, result: Result<T, CacheError>) -> Result<T, CacheError> {
        let broken = match &result {
            Err(CacheError::Timeout(_)) => true,
            Err(CacheError::Backend(err)) => err.is_io_error() || err.is_connection_dropped(),
            _ => false,
        };

        if broken {
            tracing::debug!("Dropping Redis connection after failure");
            *self.connection.lock().await = None;
        }

        result
    }

    async fn try_put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        let _: () = self.bounded(conn.set_ex(key, value, seconds)).await?;
        Ok(())
    }

    async fn try_get(&self, key: &str) -> Result<String, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = self.bounded(conn.get(key)).await?;
        value.ok_or(CacheError::Miss)
    }

    async fn try_delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = self.bounded(conn.del(key)).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheGateway for RedisCache {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let result = self.try_put(key, value, ttl).await;
        self.observe(result).await
    }

    async fn get(&self, key: &str) -> Result<String, CacheError> {
        let result = self.try_get(key).await;
        self.observe(result).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let result = self.try_delete(key).await;
        self.observe(result).await
    }
}
