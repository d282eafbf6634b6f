//! Test data builders for intake requests and worker rows

use chrono::{DateTime, Utc};
use kitchen_core::models::{OrderItemRequest, OrderRequest, Specialization, Worker, WorkerStatus};

/// Builder for intake requests; defaults to a valid single-item takeout order
pub struct OrderRequestBuilder {
    customer_name: String,
    order_type: String,
    table_number: Option<i64>,
    delivery_address: Option<String>,
    items: Vec<OrderItemRequest>,
}

impl OrderRequestBuilder {
    pub fn takeout() -> Self {
        Self {
            customer_name: "Grace Hopper".to_string(),
            order_type: "takeout".to_string(),
            table_number: None,
            delivery_address: None,
            items: Vec::new(),
        }
    }

    pub fn dine_in(table: i64) -> Self {
        Self {
            order_type: "dine_in".to_string(),
            table_number: Some(table),
            ..Self::takeout()
        }
    }

    pub fn delivery(address: &str) -> Self {
        Self {
            order_type: "delivery".to_string(),
            delivery_address: Some(address.to_string()),
            ..Self::takeout()
        }
    }

    pub fn customer(mut self, name: &str) -> Self {
        self.customer_name = name.to_string();
        self
    }

    pub fn order_type(mut self, order_type: &str) -> Self {
        self.order_type = order_type.to_string();
        self
    }

    pub fn table_number(mut self, table: Option<i64>) -> Self {
        self.table_number = table;
        self
    }

    pub fn item(mut self, name: &str, quantity: i64, price: f64) -> Self {
        self.items.push(OrderItemRequest {
            name: name.to_string(),
            quantity,
            price,
        });
        self
    }

    pub fn build(self) -> OrderRequest {
        let items = if self.items.is_empty() {
            vec![OrderItemRequest {
                name: "Margherita".to_string(),
                quantity: 1,
                price: 12.5,
            }]
        } else {
            self.items
        };

        OrderRequest {
            customer_name: self.customer_name,
            order_type: self.order_type,
            table_number: self.table_number,
            delivery_address: self.delivery_address,
            items,
        }
    }

    pub fn json(self) -> serde_json::Value {
        serde_json::to_value(self.build()).expect("order request serializes")
    }
}

/// A stored worker row with an explicit status and heartbeat time
pub fn worker_row(name: &str, status: WorkerStatus, last_seen: DateTime<Utc>) -> Worker {
    let mut worker =
        Worker::new(name, Specialization::general(), last_seen).expect("valid worker name");
    worker.status = status;
    worker
}
