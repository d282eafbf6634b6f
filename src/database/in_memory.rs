//! In-memory repositories for tests and local runs
//!
//! Same contract as the PostgreSQL adapters: creation writes the initial log
//! row, status updates are compare-and-set, and every call observes the
//! latest committed state. Clones share storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::constants::actors;
use crate::database::repository::{
    format_order_number, utc_day_bounds, OrderRepository, WorkerRepository,
};
use crate::error::{KitchenError, KitchenResult};
use crate::models::{Order, StatusLogEntry, Worker, WorkerStatus};
use crate::state_machine::{OrderStatus, OrderTransition};

#[derive(Debug, Default)]
struct OrderStore {
    next_id: i64,
    next_log_id: i64,
    orders: HashMap<String, Order>,
    log: Vec<StatusLogEntry>,
    /// Upcoming `update_order_status` calls that report a lost race
    lose_next_updates: u32,
}

impl OrderStore {
    fn append_log(&mut self, order_id: i64, status: OrderStatus, changed_by: &str, at: DateTime<Utc>) {
        self.next_log_id += 1;
        self.log.push(StatusLogEntry {
            id: self.next_log_id,
            order_id,
            status,
            changed_by: changed_by.to_string(),
            changed_at: at,
            notes: None,
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    store: Arc<Mutex<OrderStore>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` status updates behave as if another writer
    /// changed the row first
    pub fn lose_next_updates(&self, count: u32) {
        self.store.lock().lose_next_updates = count;
    }

    pub fn order_count(&self) -> usize {
        self.store.lock().orders.len()
    }

    pub fn order(&self, number: &str) -> Option<Order> {
        self.store.lock().orders.get(number).cloned()
    }

    /// Every status log row across all orders, in insertion order
    pub fn status_log(&self) -> Vec<StatusLogEntry> {
        self.store.lock().log.clone()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn generate_order_number(&self, now: DateTime<Utc>) -> KitchenResult<String> {
        let (start, end) = utc_day_bounds(now);
        let store = self.store.lock();
        let today = store
            .orders
            .values()
            .filter(|order| order.created_at >= start && order.created_at < end)
            .count() as i64;
        Ok(format_order_number(now, today + 1))
    }

    async fn create_order(&self, order: &Order) -> KitchenResult<Order> {
        let mut store = self.store.lock();
        if store.orders.contains_key(&order.number) {
            return Err(KitchenError::Database(sqlx::Error::Protocol(format!(
                "duplicate key value violates unique constraint: order number {}",
                order.number
            ))));
        }

        store.next_id += 1;
        let created = Order {
            id: store.next_id,
            ..order.clone()
        };
        store.append_log(
            created.id,
            OrderStatus::Received,
            actors::ORDER_SERVICE,
            created.created_at,
        );
        store.orders.insert(created.number.clone(), created.clone());
        Ok(created)
    }

    async fn find_order_by_number(&self, number: &str) -> KitchenResult<Option<Order>> {
        Ok(self.store.lock().orders.get(number).cloned())
    }

    async fn update_order_status(
        &self,
        order: &Order,
        transition: &OrderTransition,
    ) -> KitchenResult<bool> {
        let mut store = self.store.lock();
        if store.lose_next_updates > 0 {
            store.lose_next_updates -= 1;
            return Ok(false);
        }

        let Some(stored) = store.orders.get_mut(&order.number) else {
            return Ok(false);
        };
        if stored.id != order.id || stored.status != transition.from {
            return Ok(false);
        }

        stored.status = transition.to;
        stored.processed_by = order.processed_by.clone();
        stored.updated_at = order.updated_at;
        stored.completed_at = order.completed_at;
        store.append_log(order.id, transition.to, &transition.changed_by, transition.at);
        Ok(true)
    }

    async fn get_status_history(&self, order_id: i64) -> KitchenResult<Vec<StatusLogEntry>> {
        let store = self.store.lock();
        let mut entries: Vec<StatusLogEntry> = store
            .log
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| (entry.changed_at, entry.id));
        Ok(entries)
    }
}

#[derive(Debug, Default)]
struct WorkerStore {
    next_id: i64,
    workers: HashMap<String, Worker>,
    heartbeats: u64,
    fail_increments: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkerRepository {
    store: Arc<Mutex<WorkerStore>>,
}

impl InMemoryWorkerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn worker(&self, name: &str) -> Option<Worker> {
        self.store.lock().workers.get(name).cloned()
    }

    /// Successful `touch_heartbeat` calls so far
    pub fn heartbeat_count(&self) -> u64 {
        self.store.lock().heartbeats
    }

    /// Make `increment_processed_count` fail until switched back
    pub fn fail_increments(&self, fail: bool) {
        self.store.lock().fail_increments = fail;
    }

    /// Overwrite a stored worker, e.g. to age its heartbeat
    pub fn put(&self, worker: Worker) {
        self.store.lock().workers.insert(worker.name.clone(), worker);
    }
}

#[async_trait]
impl WorkerRepository for InMemoryWorkerRepository {
    async fn create_worker(&self, worker: &Worker) -> KitchenResult<Worker> {
        let mut store = self.store.lock();
        if store.workers.contains_key(&worker.name) {
            return Err(KitchenError::Database(sqlx::Error::Protocol(format!(
                "duplicate key value violates unique constraint: worker name {}",
                worker.name
            ))));
        }

        store.next_id += 1;
        let created = Worker {
            id: store.next_id,
            ..worker.clone()
        };
        store.workers.insert(created.name.clone(), created.clone());
        Ok(created)
    }

    async fn find_worker_by_name(&self, name: &str) -> KitchenResult<Option<Worker>> {
        Ok(self.store.lock().workers.get(name).cloned())
    }

    async fn update_worker(&self, worker: &Worker) -> KitchenResult<()> {
        let mut store = self.store.lock();
        let stored = store
            .workers
            .get_mut(&worker.name)
            .ok_or_else(|| KitchenError::WorkerNotFound(worker.name.clone()))?;
        stored.specialization = worker.specialization.clone();
        stored.status = worker.status;
        stored.last_seen = worker.last_seen;
        Ok(())
    }

    async fn touch_heartbeat(&self, name: &str, now: DateTime<Utc>) -> KitchenResult<()> {
        let mut store = self.store.lock();
        let stored = store
            .workers
            .get_mut(name)
            .ok_or_else(|| KitchenError::WorkerNotFound(name.to_string()))?;
        stored.status = WorkerStatus::Online;
        stored.last_seen = now;
        store.heartbeats += 1;
        Ok(())
    }

    async fn list_workers(&self) -> KitchenResult<Vec<Worker>> {
        let mut workers: Vec<Worker> = self.store.lock().workers.values().cloned().collect();
        workers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workers)
    }

    async fn increment_processed_count(&self, name: &str) -> KitchenResult<()> {
        let mut store = self.store.lock();
        if store.fail_increments {
            return Err(KitchenError::Database(sqlx::Error::PoolTimedOut));
        }
        let stored = store
            .workers
            .get_mut(name)
            .ok_or_else(|| KitchenError::WorkerNotFound(name.to_string()))?;
        stored.orders_processed += 1;
        Ok(())
    }
}
