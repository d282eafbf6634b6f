use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::state_machine::OrderStatus;

/// Append-only audit record of one status change
///
/// Maps to the `order_status_log` table. One row is written in the same
/// transaction as every status change, including the initial `received`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StatusLogEntry {
    pub id: i64,
    pub order_id: i64,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub notes: Option<String>,
}
