pub mod order;
pub mod order_request;
pub mod status_log;
pub mod worker;

// Re-export core models for easy access
pub use order::{NewOrder, Order, OrderItem, OrderType, Priority};
pub use order_request::{OrderItemRequest, OrderRequest};
pub use status_log::StatusLogEntry;
pub use worker::{Specialization, Worker, WorkerStatus};
