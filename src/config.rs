//! Typed settings with layered precedence: defaults → YAML file → environment.

use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

use crate::utils::CircuitBreakerConfig;

const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";
const CONFIG_PATH_VAR: &str = "OMS_CONFIG";
const ENV_PREFIX: &str = "OMS";

pub const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Total attempts for store reads, including the first one.
    pub retry_attempts: u32,
    pub retry_initial_delay_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            dbname: "orders".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 3_000,
            retry_attempts: 3,
            retry_initial_delay_ms: 50,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.dbname);

        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Expiry applied to every cached order.
    pub ttl_secs: u64,
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            timeout_ms: 500,
        }
    }
}

impl RedisConfig {
    /// Passwords go in verbatim, no URL escaping involved.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                password: self.password.clone().filter(|p| !p.is_empty()),
                ..RedisConnectionInfo::default()
            },
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub message_timeout_ms: u64,
    /// Publish on a spawned task instead of before the response is returned.
    pub detached: bool,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_secs: u64,
    pub breaker_success_threshold: u32,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: "order_events".to_string(),
            message_timeout_ms: 5_000,
            detached: false,
            breaker_failure_threshold: 5,
            breaker_reset_secs: 30,
            breaker_success_threshold: 3,
        }
    }
}

impl KafkaConfig {
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold.max(1),
            reset_after: Duration::from_secs(self.breaker_reset_secs),
            success_threshold: self.breaker_success_threshold.max(1),
        }
    }
}

impl AppConfig {
    /// Load from `$OMS_CONFIG` (or `config/config.yaml`) plus `OMS_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::new(path, FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("kafka.brokers")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".into()));
        }
        if self.kafka.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(ConfigError::Invalid("kafka.brokers must list at least one broker".into()));
        }
        if self.kafka.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("kafka.topic must not be empty".into()));
        }
        if self.redis.ttl_secs == 0 {
            return Err(ConfigError::Invalid("redis.ttl_secs must be positive".into()));
        }
        if self.database.retry_attempts == 0 {
            return Err(ConfigError::Invalid("database.retry_attempts must be at least 1".into()));
        }
        Ok(())
    }
}
