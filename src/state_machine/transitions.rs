use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{StateMachineError, StateMachineResult};
use super::states::OrderStatus;

/// A validated move between two order states
///
/// Produced by `Order::transition_to` and handed to persistence (one status
/// log row) and to the notification publisher (one status update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Worker or service that requested the transition
    pub changed_by: String,
    pub at: DateTime<Utc>,
}

impl OrderTransition {
    /// Validate `from -> to` against the lifecycle graph
    pub fn new(
        from: OrderStatus,
        to: OrderStatus,
        changed_by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> StateMachineResult<Self> {
        if !from.can_transition_to(to) {
            return Err(StateMachineError::InvalidTransition { from, to });
        }

        Ok(Self {
            from,
            to,
            changed_by: changed_by.into(),
            at,
        })
    }
}
