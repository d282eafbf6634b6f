//! # Kitchen Configuration
//!
//! Typed configuration shared by every process mode. Values are layered by
//! [`ConfigManager`]: struct defaults, then `config.yaml`, then `KITCHEN__*`
//! environment variables. Command-line flags are applied last by the binary.
//!
//! ```yaml
//! database:
//!   host: localhost
//!   port: 5432
//!   user: restaurant_user
//!   password: restaurant_pass
//!   database: restaurant_db
//! rabbitmq:
//!   host: localhost
//!   port: 5672
//!   user: guest
//!   password: guest
//! ```

pub mod error;
pub mod loader;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct KitchenConfig {
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub rabbitmq: RabbitmqConfig,
    #[validate(nested)]
    pub worker: WorkerConfig,
    #[validate(nested)]
    pub tracking: TrackingConfig,
    #[validate(nested)]
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1))]
    pub user: String,
    pub password: String,
    #[validate(length(min = 1))]
    pub database: String,
    #[validate(range(min = 1, max = 1000))]
    pub max_connections: u32,
    #[validate(range(min = 1, max = 300))]
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "restaurant_user".to_string(),
            password: "restaurant_pass".to_string(),
            database: "restaurant_db".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            percent_encode(&self.user),
            percent_encode(&self.password),
            self.host,
            self.port,
            percent_encode(&self.database)
        )
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    /// Connection target without credentials, for logs
    pub fn redacted_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

/// RabbitMQ connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RabbitmqConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1))]
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub connection_name: String,
}

impl Default for RabbitmqConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            connection_name: "kitchen-core".to_string(),
        }
    }
}

impl RabbitmqConfig {
    /// AMQP URI; the default vhost `/` renders as `%2F`
    pub fn url(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            percent_encode(&self.user),
            percent_encode(&self.password),
            self.host,
            self.port,
            percent_encode(&self.vhost)
        )
    }

    pub fn redacted_url(&self) -> String {
        format!(
            "amqp://{}:***@{}:{}/{}",
            self.user,
            self.host,
            self.port,
            percent_encode(&self.vhost)
        )
    }
}

/// Kitchen worker behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WorkerConfig {
    #[validate(range(min = 1, max = 3600))]
    pub heartbeat_interval_seconds: u64,
    #[validate(range(min = 1))]
    pub prefetch: u16,
    #[validate(range(min = 1, max = 300))]
    pub reconnect_backoff_seconds: u64,
    #[validate(range(min = 1, max = 20))]
    pub publish_max_attempts: u32,
    #[validate(range(max = 60))]
    pub publish_retry_delay_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: crate::constants::DEFAULT_HEARTBEAT_INTERVAL.as_secs(),
            prefetch: crate::constants::DEFAULT_PREFETCH,
            reconnect_backoff_seconds: crate::constants::DEFAULT_RECONNECT_BACKOFF.as_secs(),
            publish_max_attempts: crate::constants::DEFAULT_PUBLISH_MAX_ATTEMPTS,
            publish_retry_delay_seconds: crate::constants::DEFAULT_PUBLISH_RETRY_DELAY.as_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_seconds)
    }

    pub fn publish_retry_delay(&self) -> Duration {
        Duration::from_secs(self.publish_retry_delay_seconds)
    }
}

/// Tracking read-model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrackingConfig {
    #[validate(range(min = 1))]
    pub worker_offline_threshold_seconds: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            worker_offline_threshold_seconds: crate::constants::DEFAULT_WORKER_OFFLINE_THRESHOLD
                .as_secs(),
        }
    }
}

impl TrackingConfig {
    pub fn worker_offline_threshold(&self) -> Duration {
        Duration::from_secs(self.worker_offline_threshold_seconds)
    }
}

/// HTTP listener settings for intake and tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WebConfig {
    #[validate(length(min = 1))]
    pub host: String,
    pub port: u16,
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_seconds: u64,
    #[validate(range(min = 1))]
    pub max_concurrent_requests: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_seconds: 15,
            max_concurrent_requests: 50,
        }
    }
}

impl WebConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Everything outside the RFC 3986 unreserved set
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn percent_encode(raw: &str) -> String {
    utf8_percent_encode(raw, URL_COMPONENT).to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Console,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` still wins when set
    pub level: Option<String>,
}
