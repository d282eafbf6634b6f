//! # Services
//!
//! The four process roles: order intake, kitchen worker, tracking, and
//! notification subscriber. Each depends on persistence and the broker only
//! through their capability traits.

pub mod kitchen_service;
pub mod notification_service;
pub mod order_service;
pub mod tracking_service;

pub use kitchen_service::KitchenService;
pub use notification_service::NotificationService;
pub use order_service::OrderService;
pub use tracking_service::{OrderStatusView, StatusHistoryEntry, WorkerStatusView, TrackingService};
