//! # Broker Topology
//!
//! Two independent topologies:
//!
//! ```text
//! orders_topic (topic) --kitchen.#--> kitchen_queue --nack(requeue=false)-->
//!     orders_dlq (direct) --kitchen_queue--> kitchen_queue_dlq
//!
//! notifications_fanout (fanout) --> amq.gen-* (one exclusive queue per subscriber)
//! ```
//!
//! Declarations are idempotent, so every publisher and every consumer
//! connection declares what it touches.

use async_trait::async_trait;
use tracing::debug;

use crate::constants::topology;
use crate::messaging::broker::{AckMode, BrokerChannel, ExchangeKind, ExchangeSpec, QueueSpec};
use crate::messaging::errors::MessagingResult;

/// Something the dispatch loop can declare and then consume from
#[async_trait]
pub trait ConsumerTopology: Send + Sync {
    /// Declare exchanges, queues and bindings; returns the queue to consume
    async fn declare(&self, channel: &dyn BrokerChannel) -> MessagingResult<String>;

    fn ack_mode(&self) -> AckMode;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Durable work topology shared by all kitchen workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkTopology {
    pub exchange: String,
    pub queue: String,
    pub binding_pattern: String,
    pub dead_letter_exchange: String,
    pub dead_letter_queue: String,
    pub dead_letter_routing_key: String,
    pub max_priority: u8,
}

impl Default for WorkTopology {
    fn default() -> Self {
        Self::kitchen()
    }
}

impl WorkTopology {
    pub fn kitchen() -> Self {
        Self {
            exchange: topology::ORDERS_EXCHANGE.to_string(),
            queue: topology::KITCHEN_QUEUE.to_string(),
            binding_pattern: topology::KITCHEN_BINDING.to_string(),
            dead_letter_exchange: topology::DEAD_LETTER_EXCHANGE.to_string(),
            dead_letter_queue: topology::KITCHEN_DEAD_LETTER_QUEUE.to_string(),
            dead_letter_routing_key: topology::DEAD_LETTER_ROUTING_KEY.to_string(),
            max_priority: topology::KITCHEN_MAX_PRIORITY,
        }
    }

    pub fn exchange_spec(&self) -> ExchangeSpec {
        ExchangeSpec::durable(&self.exchange, ExchangeKind::Topic)
    }

    pub fn queue_spec(&self) -> QueueSpec {
        QueueSpec::durable(&self.queue)
            .with_dead_letter(&self.dead_letter_exchange, &self.dead_letter_routing_key)
            .with_max_priority(self.max_priority)
    }
}

#[async_trait]
impl ConsumerTopology for WorkTopology {
    async fn declare(&self, channel: &dyn BrokerChannel) -> MessagingResult<String> {
        channel.declare_exchange(&self.exchange_spec()).await?;

        // Dead-letter side first so the work queue never rejects into nothing
        channel
            .declare_exchange(&ExchangeSpec::durable(
                &self.dead_letter_exchange,
                ExchangeKind::Direct,
            ))
            .await?;
        channel
            .declare_queue(&QueueSpec::durable(&self.dead_letter_queue))
            .await?;
        channel
            .bind_queue(
                &self.dead_letter_queue,
                &self.dead_letter_exchange,
                &self.dead_letter_routing_key,
            )
            .await?;

        let queue = channel.declare_queue(&self.queue_spec()).await?;
        channel
            .bind_queue(&queue, &self.exchange, &self.binding_pattern)
            .await?;

        debug!(
            exchange = %self.exchange,
            queue = %queue,
            dead_letter_queue = %self.dead_letter_queue,
            "Work topology declared"
        );
        Ok(queue)
    }

    fn ack_mode(&self) -> AckMode {
        AckMode::Manual
    }

    fn name(&self) -> &str {
        &self.queue
    }
}

/// Best-effort fan-out of status changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTopology {
    pub exchange: String,
}

impl Default for NotificationTopology {
    fn default() -> Self {
        Self {
            exchange: topology::NOTIFICATIONS_EXCHANGE.to_string(),
        }
    }
}

impl NotificationTopology {
    pub fn exchange_spec(&self) -> ExchangeSpec {
        ExchangeSpec::durable(&self.exchange, ExchangeKind::Fanout)
    }
}

#[async_trait]
impl ConsumerTopology for NotificationTopology {
    async fn declare(&self, channel: &dyn BrokerChannel) -> MessagingResult<String> {
        channel.declare_exchange(&self.exchange_spec()).await?;
        let queue = channel.declare_queue(&QueueSpec::ephemeral()).await?;
        channel.bind_queue(&queue, &self.exchange, "").await?;

        debug!(exchange = %self.exchange, queue = %queue, "Notification queue declared");
        Ok(queue)
    }

    fn ack_mode(&self) -> AckMode {
        AckMode::Auto
    }

    fn name(&self) -> &str {
        &self.exchange
    }
}
