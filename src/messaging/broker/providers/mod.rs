//! # Broker Providers
//!
//! Concrete implementations of [`BrokerConnection`](super::BrokerConnection).
//!
//! ## Providers
//!
//! - [`LapinBroker`] - RabbitMQ via the lapin crate
//! - [`InMemoryBroker`] - Thread-safe in-memory exchanges and queues for testing

mod in_memory;
mod rabbitmq;

pub use in_memory::{InMemoryBroker, InspectedMessage};
pub use rabbitmq::LapinBroker;
