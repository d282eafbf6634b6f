//! Configuration Error Types

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The configuration file could not be read or parsed
    #[error("Failed to load configuration from '{path}': {error}")]
    FileLoad { path: String, error: String },

    /// Layered sources did not deserialize into the expected shape
    #[error("Invalid configuration structure: {error}")]
    Deserialization { error: String },

    /// Values parsed but violate a constraint
    #[error("Configuration validation failed: {error}")]
    Validation { error: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ConfigurationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation {
            error: errors.to_string(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
