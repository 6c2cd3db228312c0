use crate::gateways::StoreError;

// ============================================================================
// Request-level Errors
// ============================================================================
//
// Only these errors can fail a request. Cache and notification faults never
// surface here; they are absorbed by the coordinator and reported through the
// outcome sink.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    Validation(String),

    #[error("order {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => OrderError::NotFound(id),
            other => OrderError::Store(other),
        }
    }
}
