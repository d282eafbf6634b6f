use thiserror::Error;

use super::states::OrderStatus;

/// State machine failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
