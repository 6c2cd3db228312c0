use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    error::KafkaError,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};

use crate::config::KafkaConfig;
use crate::utils::{CircuitBreaker, CircuitBreakerError};

use super::{NotificationPublisher, PublishError};

pub struct KafkaPublisher {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
    send_timeout: std::time::Duration,
}

impl KafkaPublisher {
    /// The producer connects in the background; creation only fails on bad client config.
    pub fn new(config: &KafkaConfig, circuit_breaker: CircuitBreaker) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()?;

        Ok(Self {
            producer,
            circuit_breaker,
            send_timeout: config.message_timeout(),
        })
    }
}

#[async_trait]
impl NotificationPublisher for KafkaPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(topic).key(key).payload(payload);

                self.producer
                    .send(record, Timeout::After(self.send_timeout))
                    .await
                    .map(|_| ())
                    .map_err(|(err, _)| err)
            })
            .await;

        match result {
            Ok(()) => {
                tracing::info!(topic = %topic, key = %key, "Published order notification");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::debug!(topic = %topic, "Circuit breaker open, skipping publish");
                Err(PublishError::CircuitOpen)
            }
            Err(CircuitBreakerError::OperationFailed(err)) => Err(PublishError::Delivery(err)),
        }
    }
}
