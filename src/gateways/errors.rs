use std::time::Duration;

use crate::utils::IsTransient;

// ============================================================================
// Gateway Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::NotFound(_) => false,
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Key absent or expired. Expected control flow, not a fault.
    #[error("cache miss")]
    Miss,

    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("cache call timed out after {0:?}")]
    Timeout(Duration),

    #[error("cached payload could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }
}
