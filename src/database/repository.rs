//! Persistence capabilities consumed by the services
//!
//! Both traits have a PostgreSQL adapter and an in-memory double with the
//! same semantics, including the compare-and-set on status updates.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};

use crate::error::KitchenResult;
use crate::models::{Order, StatusLogEntry, Worker};
use crate::state_machine::OrderTransition;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Next `ORD_<YYYYMMDD>_<seq:03>` for the UTC day of `now`
    async fn generate_order_number(&self, now: DateTime<Utc>) -> KitchenResult<String>;

    /// Insert the order, its items and the initial `received` log row in one
    /// transaction; returns the order with its assigned id
    async fn create_order(&self, order: &Order) -> KitchenResult<Order>;

    async fn find_order_by_number(&self, number: &str) -> KitchenResult<Option<Order>>;

    /// Persist `order`'s new status and append one log row for `transition`
    ///
    /// Applied only while the stored status still equals `transition.from`.
    /// Returns `false` when another writer got there first; nothing is
    /// written in that case.
    async fn update_order_status(
        &self,
        order: &Order,
        transition: &OrderTransition,
    ) -> KitchenResult<bool>;

    /// Status log rows for `order_id`, oldest first
    async fn get_status_history(&self, order_id: i64) -> KitchenResult<Vec<StatusLogEntry>>;
}

#[async_trait]
pub trait WorkerRepository: Send + Sync {
    async fn create_worker(&self, worker: &Worker) -> KitchenResult<Worker>;

    async fn find_worker_by_name(&self, name: &str) -> KitchenResult<Option<Worker>>;

    /// Overwrite specialization, status and `last_seen`
    async fn update_worker(&self, worker: &Worker) -> KitchenResult<()>;

    /// Mark online and refresh `last_seen`
    async fn touch_heartbeat(&self, name: &str, now: DateTime<Utc>) -> KitchenResult<()>;

    /// Every worker, ordered by name
    async fn list_workers(&self) -> KitchenResult<Vec<Worker>>;

    async fn increment_processed_count(&self, name: &str) -> KitchenResult<()>;
}

/// Render an order number from its day and 1-based sequence
pub fn format_order_number(day: DateTime<Utc>, sequence: i64) -> String {
    format!(
        "{}_{}_{:03}",
        crate::constants::ORDER_NUMBER_PREFIX,
        day.format("%Y%m%d"),
        sequence
    )
}

/// `[start, end)` of the UTC day containing `now`
pub fn utc_day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}
