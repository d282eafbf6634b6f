//! # Broker Abstraction Layer
//!
//! Provider-agnostic view of an AMQP 0.9.1 style broker: connections hand out
//! channels, channels declare topology, publish, and stream deliveries that
//! are settled through their own ack/nack handle.
//!
//! ```text
//! BrokerConnection              <- open_channel(), reconnects lazily
//!   ├── LapinBroker             <- RabbitMQ
//!   └── InMemoryBroker          <- tests, with fault injection
//!
//! BrokerChannel                 <- declare / bind / qos / publish / consume
//!   └── DeliveryStream          <- Delivery { payload, routing_key, ack(), nack(requeue) }
//! ```

pub mod providers;
mod traits;
mod types;

pub use providers::{InMemoryBroker, InspectedMessage, LapinBroker};
pub use traits::{AutoAcked, BrokerChannel, BrokerConnection, DeliveryAcker, DeliveryStream};
pub use types::{AckMode, Delivery, ExchangeKind, ExchangeSpec, PublishProperties, QueueSpec};
