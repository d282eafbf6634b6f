//! # Broker Capability Traits
//!
//! The narrow surface the topology manager, publisher and dispatch loop need
//! from an AMQP-style broker. Implementations: [`LapinBroker`] for RabbitMQ
//! and [`InMemoryBroker`] for tests.
//!
//! [`LapinBroker`]: super::providers::LapinBroker
//! [`InMemoryBroker`]: super::providers::InMemoryBroker

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::types::{AckMode, Delivery, ExchangeSpec, PublishProperties, QueueSpec};
use crate::messaging::errors::MessagingResult;

/// Deliveries from one consumer; ends or yields an error when the channel dies
pub type DeliveryStream = BoxStream<'static, MessagingResult<Delivery>>;

/// A (re)connectable broker endpoint
#[async_trait]
pub trait BrokerConnection: Send + Sync + 'static {
    /// Open a fresh channel, reconnecting first if the connection dropped
    async fn open_channel(&self) -> MessagingResult<Arc<dyn BrokerChannel>>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

/// Operations available on one open channel
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Idempotent; fails if the exchange exists with a different kind
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> MessagingResult<()>;

    /// Idempotent; returns the queue name, which the broker picks when
    /// `spec.name` is empty
    async fn declare_queue(&self, spec: &QueueSpec) -> MessagingResult<String>;

    async fn bind_queue(&self, queue: &str, exchange: &str, binding_key: &str)
        -> MessagingResult<()>;

    /// Maximum unacknowledged deliveries held by this channel's consumers
    async fn set_prefetch(&self, count: u16) -> MessagingResult<()>;

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: PublishProperties,
    ) -> MessagingResult<()>;

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        ack_mode: AckMode,
    ) -> MessagingResult<DeliveryStream>;

    /// Unacknowledged deliveries go back to their queues
    async fn close(&self) -> MessagingResult<()>;
}

/// Settles a single delivery
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    async fn ack(&self) -> MessagingResult<()>;

    async fn nack(&self, requeue: bool) -> MessagingResult<()>;
}

/// Acker for auto-ack consumers, where the broker has already settled
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAcked;

#[async_trait]
impl DeliveryAcker for AutoAcked {
    async fn ack(&self) -> MessagingResult<()> {
        Ok(())
    }

    async fn nack(&self, _requeue: bool) -> MessagingResult<()> {
        Ok(())
    }
}
