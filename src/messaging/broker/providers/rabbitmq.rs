//! # RabbitMQ Broker
//!
//! Production [`BrokerConnection`] on the `lapin` crate (AMQP 0.9.1).
//!
//! ## Features
//!
//! - **Lazy reconnect**: `open_channel` re-dials when the cached connection
//!   is no longer connected, so the dispatch loop's backoff-and-retry is all
//!   that is needed to survive a broker restart
//! - **Dead Letter Exchanges**: declared through queue arguments
//! - **Prefetch Control**: `basic_qos` per channel
//!
//! ## Usage
//!
//! ```ignore
//! use kitchen_core::config::RabbitmqConfig;
//! use kitchen_core::messaging::broker::{BrokerConnection, LapinBroker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = LapinBroker::connect(RabbitmqConfig::default()).await?;
//! let channel = broker.open_channel().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RabbitmqConfig;
use crate::constants::{topology, JSON_CONTENT_TYPE};
use crate::messaging::broker::traits::{
    AutoAcked, BrokerChannel, BrokerConnection, DeliveryAcker, DeliveryStream,
};
use crate::messaging::broker::types::{
    AckMode, Delivery, ExchangeKind, ExchangeSpec, PublishProperties, QueueSpec,
};
use crate::messaging::errors::{MessagingError, MessagingResult};

/// AMQP delivery mode for messages that survive a broker restart
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// RabbitMQ-backed broker connection
pub struct LapinBroker {
    config: RabbitmqConfig,
    connection: Mutex<Option<Connection>>,
}

impl fmt::Debug for LapinBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LapinBroker")
            .field("url", &self.config.redacted_url())
            .finish()
    }
}

impl LapinBroker {
    /// Create without dialing; the first `open_channel` connects
    pub fn new(config: RabbitmqConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    /// Create and dial immediately so misconfiguration surfaces at startup
    pub async fn connect(config: RabbitmqConfig) -> MessagingResult<Self> {
        let broker = Self::new(config);
        let connection = broker.dial().await?;
        *broker.connection.lock().await = Some(connection);
        Ok(broker)
    }

    async fn dial(&self) -> MessagingResult<Connection> {
        let connection = Connection::connect(
            &self.config.url(),
            ConnectionProperties::default()
                .with_connection_name(self.config.connection_name.clone().into()),
        )
        .await
        .map_err(|e| MessagingError::connection(format!("RabbitMQ connection failed: {e}")))?;

        info!(
            url = %self.config.redacted_url(),
            "🐇 Connected to RabbitMQ"
        );
        Ok(connection)
    }

    /// Close the underlying connection, if any
    pub async fn shutdown(&self) {
        if let Some(connection) = self.connection.lock().await.take() {
            if let Err(e) = connection.close(200, "shutdown").await {
                debug!(error = %e, "RabbitMQ connection close failed");
            }
        }
    }
}

#[async_trait]
impl BrokerConnection for LapinBroker {
    async fn open_channel(&self) -> MessagingResult<Arc<dyn BrokerChannel>> {
        let mut guard = self.connection.lock().await;

        let needs_dial = guard
            .as_ref()
            .map_or(true, |connection| !connection.status().connected());
        if needs_dial {
            if guard.is_some() {
                warn!("RabbitMQ connection lost, reconnecting");
            }
            *guard = Some(self.dial().await?);
        }

        let connection = guard
            .as_ref()
            .ok_or_else(|| MessagingError::connection("RabbitMQ connection unavailable"))?;

        let channel = connection.create_channel().await.map_err(|e| {
            MessagingError::channel(format!("RabbitMQ channel creation failed: {e}"))
        })?;

        Ok(Arc::new(LapinChannel { channel }))
    }

    fn provider_name(&self) -> &'static str {
        "rabbitmq"
    }
}

#[derive(Debug)]
struct LapinChannel {
    channel: Channel,
}

fn lapin_exchange_kind(kind: ExchangeKind) -> lapin::ExchangeKind {
    match kind {
        ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        ExchangeKind::Direct => lapin::ExchangeKind::Direct,
        ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
    }
}

fn queue_arguments(spec: &QueueSpec) -> FieldTable {
    let mut args = FieldTable::default();
    if let Some(exchange) = &spec.dead_letter_exchange {
        args.insert(
            topology::DEAD_LETTER_EXCHANGE_ARG.into(),
            AMQPValue::LongString(exchange.clone().into()),
        );
    }
    if let Some(routing_key) = &spec.dead_letter_routing_key {
        args.insert(
            topology::DEAD_LETTER_ROUTING_KEY_ARG.into(),
            AMQPValue::LongString(routing_key.clone().into()),
        );
    }
    if let Some(max_priority) = spec.max_priority {
        args.insert(
            topology::MAX_PRIORITY_ARG.into(),
            AMQPValue::ShortShortUInt(max_priority),
        );
    }
    args
}

#[async_trait]
impl BrokerChannel for LapinChannel {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> MessagingResult<()> {
        self.channel
            .exchange_declare(
                &spec.name,
                lapin_exchange_kind(spec.kind),
                ExchangeDeclareOptions {
                    durable: spec.durable,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::topology(&spec.name, e.to_string()))
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> MessagingResult<String> {
        let queue = self
            .channel
            .queue_declare(
                &spec.name,
                QueueDeclareOptions {
                    durable: spec.durable,
                    exclusive: spec.exclusive,
                    auto_delete: spec.auto_delete,
                    ..Default::default()
                },
                queue_arguments(spec),
            )
            .await
            .map_err(|e| MessagingError::topology(&spec.name, e.to_string()))?;

        Ok(queue.name().as_str().to_string())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        binding_key: &str,
    ) -> MessagingResult<()> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                binding_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::topology(format!("{exchange} -> {queue}"), e.to_string()))
    }

    async fn set_prefetch(&self, count: u16) -> MessagingResult<()> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(|e| MessagingError::channel(format!("Failed to set QoS: {e}")))
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: PublishProperties,
    ) -> MessagingResult<()> {
        let mut amqp_properties =
            BasicProperties::default().with_content_type(JSON_CONTENT_TYPE.into());
        if properties.persistent {
            amqp_properties = amqp_properties.with_delivery_mode(PERSISTENT_DELIVERY_MODE);
        }
        if let Some(priority) = properties.priority {
            amqp_properties = amqp_properties.with_priority(priority);
        }

        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                amqp_properties,
            )
            .await
            .map_err(|e| MessagingError::publish(exchange, routing_key, e.to_string()))?;

        confirm.await.map_err(|e| {
            MessagingError::publish(exchange, routing_key, format!("confirmation failed: {e}"))
        })?;

        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        ack_mode: AckMode,
    ) -> MessagingResult<DeliveryStream> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: ack_mode == AckMode::Auto,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::consume(queue, e.to_string()))?;

        let queue_name = queue.to_string();
        let stream = consumer.map(move |result| match result {
            Ok(delivery) => {
                let delivery_tag = delivery.delivery_tag;
                let acker: Box<dyn DeliveryAcker> = match ack_mode {
                    AckMode::Manual => Box::new(LapinAcker {
                        acker: delivery.acker,
                        delivery_tag,
                    }),
                    AckMode::Auto => Box::new(AutoAcked),
                };
                Ok(Delivery::new(
                    delivery_tag,
                    delivery.exchange.as_str(),
                    delivery.routing_key.as_str(),
                    delivery.data,
                    delivery.redelivered,
                    acker,
                ))
            }
            Err(e) => Err(MessagingError::consume(&queue_name, e.to_string())),
        });

        Ok(stream.boxed())
    }

    async fn close(&self) -> MessagingResult<()> {
        if !self.channel.status().connected() {
            return Ok(());
        }
        self.channel
            .close(200, "OK")
            .await
            .map_err(|e| MessagingError::channel(format!("channel close failed: {e}")))
    }
}

struct LapinAcker {
    acker: Acker,
    delivery_tag: u64,
}

#[async_trait]
impl DeliveryAcker for LapinAcker {
    async fn ack(&self) -> MessagingResult<()> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| MessagingError::acknowledgement(self.delivery_tag, e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> MessagingResult<()> {
        self.acker
            .nack(BasicNackOptions {
                requeue,
                ..Default::default()
            })
            .await
            .map(|_| ())
            .map_err(|e| MessagingError::acknowledgement(self.delivery_tag, e.to_string()))
    }
}
