use async_trait::async_trait;

use crate::models::{InsertReceipt, NewOrder, Order};
use crate::utils::{retry_on_transient, RetryPolicy};

use super::{OrderStore, StoreError};

/// Retries transient read failures of the wrapped store.
///
/// Inserts are attempted exactly once: a write whose acknowledgement was lost
/// may already be committed, and repeating it would create a second order.
pub struct RetryingOrderStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: OrderStore> RetryingOrderStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<S: OrderStore> OrderStore for RetryingOrderStore<S> {
    async fn insert(&self, order: &NewOrder) -> Result<InsertReceipt, StoreError> {
        self.inner.insert(order).await
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Order, StoreError> {
        retry_on_transient(&self.policy, "store.fetch_by_id", |_attempt| {
            self.inner.fetch_by_id(id)
        })
        .await
    }
}
