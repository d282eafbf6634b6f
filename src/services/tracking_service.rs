//! # Tracking Service
//!
//! Read-only projections over persisted orders and workers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_WORKER_OFFLINE_THRESHOLD;
use crate::database::{OrderRepository, WorkerRepository};
use crate::error::{KitchenError, KitchenResult};
use crate::models::{Order, WorkerStatus};
use crate::state_machine::OrderStatus;
use crate::utils::SharedClock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusView {
    pub order_number: String,
    pub current_status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    /// Only while cooking
    pub estimated_completion: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
}

impl OrderStatusView {
    pub fn from_order(order: &Order) -> Self {
        let estimated_completion = (order.status == OrderStatus::Cooking)
            .then(|| order.estimated_completion_from(order.updated_at));
        Self {
            order_number: order.number.clone(),
            current_status: order.status,
            updated_at: order.updated_at,
            estimated_completion,
            processed_by: order.processed_by.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub changed_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatusView {
    pub worker_name: String,
    pub status: WorkerStatus,
    pub orders_processed: i64,
    pub last_seen: DateTime<Utc>,
}

pub struct TrackingService {
    orders: Arc<dyn OrderRepository>,
    workers: Arc<dyn WorkerRepository>,
    clock: SharedClock,
    offline_threshold: Duration,
}

impl std::fmt::Debug for TrackingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingService")
            .field("offline_threshold", &self.offline_threshold)
            .finish()
    }
}

impl TrackingService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        workers: Arc<dyn WorkerRepository>,
        clock: SharedClock,
    ) -> Self {
        Self {
            orders,
            workers,
            clock,
            offline_threshold: DEFAULT_WORKER_OFFLINE_THRESHOLD,
        }
    }

    pub fn with_offline_threshold(mut self, threshold: Duration) -> Self {
        self.offline_threshold = threshold;
        self
    }

    async fn find_order(&self, number: &str) -> KitchenResult<Order> {
        self.orders
            .find_order_by_number(number)
            .await?
            .ok_or_else(|| KitchenError::OrderNotFound(number.to_string()))
    }

    pub async fn get_order_status(&self, number: &str) -> KitchenResult<OrderStatusView> {
        let order = self.find_order(number).await?;
        Ok(OrderStatusView::from_order(&order))
    }

    pub async fn get_order_history(&self, number: &str) -> KitchenResult<Vec<StatusHistoryEntry>> {
        let order = self.find_order(number).await?;
        let history = self
            .orders
            .get_status_history(order.id)
            .await?
            .into_iter()
            .map(|entry| StatusHistoryEntry {
                status: entry.status,
                timestamp: entry.changed_at,
                changed_by: entry.changed_by,
            })
            .collect();
        Ok(history)
    }

    /// Every worker by name, with stale heartbeats reported offline
    pub async fn get_workers_status(&self) -> KitchenResult<Vec<WorkerStatusView>> {
        let now = self.clock.now();
        let workers = self.workers.list_workers().await?;
        Ok(workers
            .into_iter()
            .map(|worker| WorkerStatusView {
                status: worker.effective_status(now, self.offline_threshold),
                worker_name: worker.name,
                orders_processed: worker.orders_processed,
                last_seen: worker.last_seen,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderRequest, Specialization, Worker};

    #[test]
    fn test_estimate_only_while_cooking() {
        let draft = OrderRequest {
            customer_name: "Ada".to_string(),
            order_type: "delivery".to_string(),
            table_number: None,
            delivery_address: Some("221B Baker Street".to_string()),
            items: vec![crate::models::OrderItemRequest {
                name: "Pie".to_string(),
                quantity: 1,
                price: 10.0,
            }],
        }
        .into_new_order()
        .unwrap();
        let created = Utc::now();
        let mut order = Order::new("ORD_20240115_001", draft, created);
        assert!(OrderStatusView::from_order(&order).estimated_completion.is_none());

        order
            .transition_to(OrderStatus::Cooking, "chef_anna", created)
            .unwrap();
        let view = OrderStatusView::from_order(&order);
        assert_eq!(
            view.estimated_completion,
            Some(created + chrono::Duration::seconds(12))
        );
        assert_eq!(view.processed_by.as_deref(), Some("chef_anna"));
    }

    #[test]
    fn test_worker_view_serialization() {
        let worker = Worker::new("chef_anna", Specialization::general(), Utc::now()).unwrap();
        let view = WorkerStatusView {
            worker_name: worker.name.clone(),
            status: worker.status,
            orders_processed: 3,
            last_seen: worker.last_seen,
        };
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["status"], "online");
        assert_eq!(value["orders_processed"], 3);
    }
}
