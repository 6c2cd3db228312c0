// ============================================================================
// Order Coordinator
// ============================================================================
//
// Write path:  store insert -> cache put -> publish
// Read path:   cache get -> (miss or fault) store fetch -> cache refresh
//
// The store is authoritative. Only store failures (and NotFound on reads)
// fail a request; cache and publish faults go to the outcome sink.
//
// ============================================================================

mod outcome;

use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_CACHE_TTL_SECS;
use crate::errors::OrderError;
use crate::gateways::{CacheGateway, CacheGatewayExt, OrderStore, StoreError};
use crate::messaging::{NotificationPublisher, PublishError};
use crate::models::{NewOrder, Order};

pub use outcome::{CacheLookup, OutcomeSink, SoftFailure};

pub fn cache_key(id: i64) -> String {
    format!("order:{}", id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Publish before `create_order` returns.
    Inline,
    /// Publish on a spawned task; the response does not wait for the broker.
    Detached,
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub cache_ttl: Duration,
    pub topic: String,
    pub publish_mode: PublishMode,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            topic: "order_events".to_string(),
            publish_mode: PublishMode::Inline,
        }
    }
}

#[derive(Clone)]
pub struct OrderCoordinator {
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn CacheGateway>,
    publisher: Arc<dyn NotificationPublisher>,
    sink: Arc<dyn OutcomeSink>,
    settings: CoordinatorSettings,
}

impl OrderCoordinator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<dyn CacheGateway>,
        publisher: Arc<dyn NotificationPublisher>,
        sink: Arc<dyn OutcomeSink>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            sink,
            settings,
        }
    }

    pub async fn create_order(&self, draft: NewOrder) -> Result<Order, OrderError> {
        let receipt = match self.store.insert(&draft).await {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::error!(error = %err, "Failed to persist order");
                self.sink.store_failure("insert");
                return Err(err.into());
            }
        };

        let order = draft.into_order(receipt);
        tracing::info!(order_id = order.id, "Order persisted");
        self.sink.order_created(order.id);

        self.refresh_cache(&order).await;
        self.announce(&order).await;

        Ok(order)
    }

    pub async fn get_order(&self, id: i64) -> Result<Order, OrderError> {
        let key = cache_key(id);

        match self.cache.get_json::<Order>(&key).await {
            Ok(order) => {
                tracing::debug!(order_id = id, "Cache hit");
                self.sink.cache_lookup(CacheLookup::Hit);
                return Ok(order);
            }
            Err(err) if err.is_miss() => {
                tracing::debug!(order_id = id, "Cache miss, reading from store");
                self.sink.cache_lookup(CacheLookup::Miss);
            }
            Err(err) => {
                self.sink.soft_failure(SoftFailure::CacheRead {
                    key,
                    error: err.to_string(),
                });
            }
        }

        let order = match self.store.fetch_by_id(id).await {
            Ok(order) => order,
            Err(StoreError::NotFound(_)) => return Err(OrderError::NotFound(id)),
            Err(err) => {
                tracing::error!(order_id = id, error = %err, "Failed to read order from store");
                self.sink.store_failure("fetch_by_id");
                return Err(err.into());
            }
        };

        self.refresh_cache(&order).await;
        Ok(order)
    }

    async fn refresh_cache(&self, order: &Order) {
        let key = cache_key(order.id);
        if let Err(err) = self.cache.put_json(&key, order, self.settings.cache_ttl).await {
            self.sink.soft_failure(SoftFailure::CacheWrite {
                key,
                error: err.to_string(),
            });
        }
    }

    async fn announce(&self, order: &Order) {
        let payload = match serde_json::to_string(order) {
            Ok(payload) => payload,
            Err(err) => {
                self.sink.soft_failure(SoftFailure::Publish {
                    topic: self.settings.topic.clone(),
                    order_id: order.id,
                    error: PublishError::from(err).to_string(),
                });
                return;
            }
        };

        let notification = Notification {
            topic: self.settings.topic.clone(),
            order_id: order.id,
            payload,
        };

        match self.settings.publish_mode {
            PublishMode::Inline => {
                notification.deliver(self.publisher.as_ref(), self.sink.as_ref()).await;
            }
            PublishMode::Detached => {
                let publisher = self.publisher.clone();
                let sink = self.sink.clone();
                tokio::spawn(async move {
                    notification.deliver(publisher.as_ref(), sink.as_ref()).await;
                });
            }
        }
    }
}

struct Notification {
    topic: String,
    order_id: i64,
    payload: String,
}

impl Notification {
    async fn deliver(self, publisher: &dyn NotificationPublisher, sink: &dyn OutcomeSink) {
        let key = self.order_id.to_string();
        match publisher.publish(&self.topic, &key, &self.payload).await {
            Ok(()) => sink.published(self.order_id),
            Err(err) => sink.soft_failure(SoftFailure::Publish {
                topic: self.topic,
                order_id: self.order_id,
                error: err.to_string(),
            }),
        }
    }
}
