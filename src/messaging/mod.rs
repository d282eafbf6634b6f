//! # Messaging Module
//!
//! Broker-facing plumbing: topology declaration, order and notification
//! payloads, publishing with retry, and the dispatch loop that feeds
//! deliveries to handlers.

pub mod broker;
pub mod consumer;
pub mod errors;
pub mod message;
pub mod publisher;
pub mod routing;
pub mod topology;

pub use consumer::{ConsumerConfig, DeliveryOutcome, MessageConsumer, MessageHandler};
pub use errors::{MessagingError, MessagingResult};
pub use message::{OrderMessage, StatusUpdateMessage};
pub use publisher::{MessagePublisher, RetryPolicy};
pub use routing::order_routing_key;
pub use topology::{ConsumerTopology, NotificationTopology, WorkTopology};
