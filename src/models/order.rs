use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::time::Duration;

use crate::state_machine::{OrderStatus, OrderTransition, StateMachineResult};

/// Order types accepted by the kitchen
///
/// This enum is the single source of truth for the legal type set: request
/// validation, persistence, routing keys, and worker specializations all go
/// through it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeout,
    Delivery,
}

impl OrderType {
    pub const ALL: [OrderType; 3] = [Self::DineIn, Self::Takeout, Self::Delivery];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DineIn => "dine_in",
            Self::Takeout => "takeout",
            Self::Delivery => "delivery",
        }
    }

    /// Simulated cooking time
    ///
    /// Tracking and notifications derive estimated completion from this, so
    /// the values are part of the observable contract.
    pub fn cooking_duration(&self) -> Duration {
        match self {
            Self::DineIn => Duration::from_secs(8),
            Self::Takeout => Duration::from_secs(10),
            Self::Delivery => Duration::from_secs(12),
        }
    }

    pub fn requires_table_number(&self) -> bool {
        matches!(self, Self::DineIn)
    }

    pub fn requires_delivery_address(&self) -> bool {
        matches!(self, Self::Delivery)
    }

    /// Human list of legal values, used in validation messages
    pub fn expected_values() -> String {
        Self::ALL
            .iter()
            .map(OrderType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|order_type| order_type.as_str() == s)
            .ok_or_else(|| format!("Invalid order type: {s}"))
    }
}

impl TryFrom<String> for OrderType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Dispatch priority derived from the order total
///
/// Serialized as its broker priority value (1, 5, 10) on the wire and in the
/// database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Priority {
    Low = 1,
    Medium = 5,
    High = 10,
}

impl Priority {
    /// `high` above 100.00, `medium` from 50.00 to 100.00 inclusive, else `low`
    pub fn from_total_cents(total_cents: i64) -> Self {
        if total_cents > 10_000 {
            Self::High
        } else if total_cents >= 5_000 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn value(&self) -> i32 {
        *self as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> Self {
        priority.value()
    }
}

impl TryFrom<i32> for Priority {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Low),
            5 => Ok(Self::Medium),
            10 => Ok(Self::High),
            other => Err(format!("Invalid priority value: {other}")),
        }
    }
}

/// Line item owned by exactly one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub name: String,
    pub quantity: i32,
    pub price: f64,
}

impl OrderItem {
    /// Unit price in whole cents
    pub fn price_cents(&self) -> i64 {
        (self.price * 100.0).round() as i64
    }

    pub fn line_total_cents(&self) -> i64 {
        self.price_cents() * i64::from(self.quantity)
    }
}

/// Sum of `quantity x price` over all items, in cents
///
/// Working in cents keeps the priority thresholds exact at their boundaries.
pub fn total_cents(items: &[OrderItem]) -> i64 {
    items.iter().map(OrderItem::line_total_cents).sum()
}

pub fn cents_to_amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Validated order input, not yet numbered or persisted
///
/// Built by `OrderRequest::into_new_order`; total and priority are computed
/// here once and never recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_name: String,
    pub order_type: OrderType,
    pub table_number: Option<i32>,
    pub delivery_address: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub priority: Priority,
}

impl NewOrder {
    pub(crate) fn new(
        customer_name: String,
        order_type: OrderType,
        table_number: Option<i32>,
        delivery_address: Option<String>,
        items: Vec<OrderItem>,
    ) -> Self {
        let cents = total_cents(&items);
        Self {
            customer_name,
            order_type,
            table_number,
            delivery_address,
            total_amount: cents_to_amount(cents),
            priority: Priority::from_total_cents(cents),
            items,
        }
    }
}

/// Restaurant order
///
/// Maps to the `orders` table; `items` are loaded from `order_items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub number: String,
    pub customer_name: String,
    #[sqlx(rename = "type", try_from = "String")]
    pub order_type: OrderType,
    pub table_number: Option<i32>,
    pub delivery_address: Option<String>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    #[sqlx(try_from = "i32")]
    pub priority: Priority,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub processed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Number a validated order; the row id is assigned when it is persisted
    pub fn new(number: impl Into<String>, new_order: NewOrder, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            number: number.into(),
            customer_name: new_order.customer_name,
            order_type: new_order.order_type,
            table_number: new_order.table_number,
            delivery_address: new_order.delivery_address,
            items: new_order.items,
            total_amount: new_order.total_amount,
            priority: new_order.priority,
            status: OrderStatus::Received,
            processed_by: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Move to `target`, leaving the order untouched if the move is illegal
    ///
    /// Entering `cooking` or `ready` records `changed_by` as the processor;
    /// entering `ready` stamps `completed_at`.
    pub fn transition_to(
        &mut self,
        target: OrderStatus,
        changed_by: &str,
        at: DateTime<Utc>,
    ) -> StateMachineResult<OrderTransition> {
        let transition = OrderTransition::new(self.status, target, changed_by, at)?;

        self.status = target;
        self.updated_at = at;
        if target.records_processor() {
            self.processed_by = Some(changed_by.to_string());
        }
        if target == OrderStatus::Ready {
            self.completed_at = Some(at);
        }

        Ok(transition)
    }

    pub fn cooking_duration(&self) -> Duration {
        self.order_type.cooking_duration()
    }

    /// `from + cooking duration`, saturating on absurd inputs
    pub fn estimated_completion_from(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.cooking_duration())
            .ok()
            .and_then(|cook| from.checked_add_signed(cook))
            .unwrap_or(from)
    }

    pub fn total_cents(&self) -> i64 {
        (self.total_amount * 100.0).round() as i64
    }
}
