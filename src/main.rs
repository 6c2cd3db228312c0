use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod coordinator;
mod errors;
mod gateways;
mod http;
mod messaging;
mod metrics;
mod models;
mod utils;

use crate::config::AppConfig;
use crate::coordinator::{CoordinatorSettings, OrderCoordinator, PublishMode};
use crate::gateways::{PostgresOrderStore, RedisCache, RetryingOrderStore};
use crate::messaging::KafkaPublisher;
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, RetryPolicy};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter, e.g. RUST_LOG=order_service=trace
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_service=debug")),
        )
        .init();

    tracing::info!("Starting order service");

    let config = AppConfig::load()?;

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);

    // === 2. Durable store (pool connects on first use) ===
    let store = RetryingOrderStore::new(
        PostgresOrderStore::connect_lazy(&config.database),
        RetryPolicy::new(
            config.database.retry_attempts,
            Duration::from_millis(config.database.retry_initial_delay_ms),
        ),
    );
    tracing::info!(
        host = %config.database.host,
        dbname = %config.database.dbname,
        "Postgres store configured"
    );

    // === 3. Cache ===
    let cache = RedisCache::new(&config.redis)?;
    tracing::info!(
        host = %config.redis.host,
        ttl_secs = config.redis.ttl_secs,
        "Redis cache configured"
    );

    // === 4. Publisher behind a circuit breaker ===
    let breaker_metrics = metrics.clone();
    let breaker = CircuitBreaker::new("kafka", config.kafka.breaker())
        .with_observer(move |from, to| breaker_metrics.record_circuit_transition(from, to));
    metrics.set_circuit_state(breaker.state());

    let publisher = KafkaPublisher::new(&config.kafka, breaker)?;
    tracing::info!(
        brokers = %config.kafka.bootstrap_servers(),
        topic = %config.kafka.topic,
        detached = config.kafka.detached,
        "Kafka publisher configured"
    );

    // === 5. Coordinator ===
    let coordinator = OrderCoordinator::new(
        Arc::new(store),
        Arc::new(cache),
        Arc::new(publisher),
        metrics.clone(),
        CoordinatorSettings {
            cache_ttl: config.redis.ttl(),
            topic: config.kafka.topic.clone(),
            publish_mode: if config.kafka.detached {
                PublishMode::Detached
            } else {
                PublishMode::Inline
            },
        },
    );

    // === 6. HTTP ===
    http::serve(&config.server, coordinator, metrics).await?;

    tracing::info!("Order service stopped");
    Ok(())
}
