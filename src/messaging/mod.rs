mod kafka;

#[cfg(test)]
pub mod recording;

use async_trait::async_trait;
use rdkafka::error::KafkaError;

pub use kafka::KafkaPublisher;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("circuit breaker open, publisher unavailable")]
    CircuitOpen,

    #[error("delivery failed: {0}")]
    Delivery(#[from] KafkaError),

    #[error("payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Best-effort, at-most-once delivery of a single message.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// `key` selects the partition so that messages for one order stay ordered.
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError>;
}
