//! # Error Taxonomy
//!
//! `KitchenError` is the crate-wide error. Every variant maps onto exactly one
//! [`FailureClass`], and the dispatch loop chooses ack, requeue, or
//! dead-letter from that class alone.

use std::fmt;
use thiserror::Error;

use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use crate::models::order::OrderType;
use crate::state_machine::StateMachineError;
use crate::validation::ValidationErrors;

#[derive(Error, Debug)]
pub enum KitchenError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    InvalidTransition(#[from] StateMachineError),

    #[error("Worker {worker_name} cannot handle order type {order_type}")]
    SpecializationMismatch {
        worker_name: String,
        order_type: OrderType,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    #[error("Worker with name {0} is already online")]
    WorkerAlreadyOnline(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("Failed to publish after {attempts} attempts: {last_error}")]
    PublishFailed { attempts: u32, last_error: String },

    #[error("Malformed message payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Operation cancelled")]
    Cancelled,
}

/// How a failure should be treated by whoever observes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Bad input; rejected before persistence and never retried
    Validation,
    /// State machine violation; surfaced, never retried
    InvalidTransition,
    /// Not this worker's order type; another worker should take it
    SpecializationMismatch,
    /// Broker or store unavailable
    TransientInfrastructure,
    /// Anything else a handler can fail with
    PermanentProcessing,
    /// Cooperative shutdown interrupted the operation
    Cancelled,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::InvalidTransition => "invalid_transition",
            Self::SpecializationMismatch => "specialization_mismatch",
            Self::TransientInfrastructure => "transient_infrastructure",
            Self::PermanentProcessing => "permanent_processing",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl KitchenError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }

    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::Validation(_) => FailureClass::Validation,
            Self::InvalidTransition(_) => FailureClass::InvalidTransition,
            Self::SpecializationMismatch { .. } => FailureClass::SpecializationMismatch,
            Self::Database(_) | Self::Messaging(_) | Self::PublishFailed { .. } => {
                FailureClass::TransientInfrastructure
            }
            Self::OrderNotFound(_)
            | Self::WorkerNotFound(_)
            | Self::WorkerAlreadyOnline(_)
            | Self::MalformedPayload(_)
            | Self::Configuration(_) => FailureClass::PermanentProcessing,
            Self::Cancelled => FailureClass::Cancelled,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::OrderNotFound(_) | Self::WorkerNotFound(_))
    }
}

impl From<ValidationErrors> for KitchenError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<serde_json::Error> for KitchenError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}

pub type KitchenResult<T> = Result<T, KitchenError>;
