//! Configuration Loader
//!
//! Layers struct defaults, an optional YAML file and `KITCHEN__SECTION__KEY`
//! environment variables through the `config` crate, then validates the
//! result with `validator`.

use super::error::{ConfigResult, ConfigurationError};
use super::KitchenConfig;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

/// File read when no explicit path is given; absent is fine
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Prefix for environment overrides, e.g. `KITCHEN__RABBITMQ__HOST`
pub const ENV_PREFIX: &str = "KITCHEN";

const ENV_SEPARATOR: &str = "__";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: KitchenConfig,
    environment: String,
    source_path: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    ///
    /// An explicit `path` must exist. Without one, `config.yaml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_with_env(path, &environment, None)
    }

    /// Load with an explicit environment name and, optionally, a fixed set of
    /// environment variables instead of the process environment
    pub fn load_with_env(
        path: Option<&Path>,
        environment: &str,
        env_vars: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let (source_path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        debug!(
            environment = %environment,
            path = %source_path.display(),
            required,
            "Loading configuration"
        );

        let raw = config::Config::builder()
            .add_source(
                config::File::from(source_path.as_path())
                    .format(config::FileFormat::Yaml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env_vars),
            )
            .build()
            .map_err(|e| ConfigurationError::FileLoad {
                path: source_path.display().to_string(),
                error: e.to_string(),
            })?;

        let config: KitchenConfig =
            raw.try_deserialize()
                .map_err(|e| ConfigurationError::Deserialization {
                    error: e.to_string(),
                })?;

        Self::from_config(config, environment, source_path)
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(
        config: KitchenConfig,
        environment: &str,
        source_path: PathBuf,
    ) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;

        let sanitized = Self::sanitize_config_for_logging(&config);
        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&sanitized)
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = %environment,
            database = %config.database.redacted_url(),
            rabbitmq = %config.rabbitmq.redacted_url(),
            "⚙️ Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            source_path,
        }))
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// `KITCHEN_ENV`, then `APP_ENV`, defaulting to development
    pub fn detect_environment() -> String {
        env::var("KITCHEN_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// JSON view of the configuration with credentials masked
    pub fn sanitize_config_for_logging(config: &KitchenConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "token", "credential"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        *val = match val {
                            serde_json::Value::String(s) if s.is_empty() => {
                                serde_json::Value::String("[EMPTY]".to_string())
                            }
                            _ => serde_json::Value::String("[MASKED]".to_string()),
                        };
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}
