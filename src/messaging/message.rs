//! # Broker Message Structures
//!
//! Wire-stable JSON payloads for order dispatch and status notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::models::{Order, OrderItem, OrderType, Priority};
use crate::state_machine::{OrderStatus, OrderTransition};

/// Order dispatched to the kitchen queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderMessage {
    pub order_number: String,
    pub customer_name: String,
    pub order_type: OrderType,
    pub table_number: Option<i32>,
    pub delivery_address: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    /// Broker priority value (1, 5 or 10)
    pub priority: Priority,
}

impl OrderMessage {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_number: order.number.clone(),
            customer_name: order.customer_name.clone(),
            order_type: order.order_type,
            table_number: order.table_number,
            delivery_address: order.delivery_address.clone(),
            items: order.items.clone(),
            total_amount: order.total_amount,
            priority: order.priority,
        }
    }

    pub fn to_bytes(&self) -> MessagingResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> MessagingResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }
}

/// Status change broadcast on the notifications fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdateMessage {
    pub order_number: String,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub changed_by: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl StatusUpdateMessage {
    pub fn from_transition(order_number: impl Into<String>, transition: &OrderTransition) -> Self {
        Self {
            order_number: order_number.into(),
            old_status: transition.from,
            new_status: transition.to,
            changed_by: transition.changed_by.clone(),
            timestamp: transition.at,
            estimated_completion: None,
        }
    }

    pub fn with_estimated_completion(mut self, at: DateTime<Utc>) -> Self {
        self.estimated_completion = Some(at);
        self
    }

    /// Line printed by notification subscribers
    pub fn describe(&self) -> String {
        format!(
            "Notification for order {}: Status changed from '{}' to '{}' by {}",
            self.order_number, self.old_status, self.new_status, self.changed_by
        )
    }

    pub fn to_bytes(&self) -> MessagingResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> MessagingResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }
}
