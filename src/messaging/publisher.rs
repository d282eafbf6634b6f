//! # Message Publisher
//!
//! Publishes order dispatch messages and status notifications with bounded,
//! cancellation-aware retry. Each attempt opens its own channel and declares
//! the target exchange, so a publish after a broker restart needs no extra
//! recovery step.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::constants::{DEFAULT_PUBLISH_MAX_ATTEMPTS, DEFAULT_PUBLISH_RETRY_DELAY};
use crate::error::{KitchenError, KitchenResult};
use crate::messaging::broker::{BrokerConnection, ExchangeSpec, PublishProperties};
use crate::messaging::errors::MessagingResult;
use crate::messaging::message::{OrderMessage, StatusUpdateMessage};
use crate::messaging::routing::order_routing_key;
use crate::messaging::topology::{NotificationTopology, WorkTopology};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_PUBLISH_MAX_ATTEMPTS,
            retry_delay: DEFAULT_PUBLISH_RETRY_DELAY,
        }
    }
}

impl From<&WorkerConfig> for RetryPolicy {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            max_attempts: config.publish_max_attempts.max(1),
            retry_delay: config.publish_retry_delay(),
        }
    }
}

pub struct MessagePublisher {
    connection: Arc<dyn BrokerConnection>,
    work: WorkTopology,
    notifications: NotificationTopology,
    retry: RetryPolicy,
}

impl std::fmt::Debug for MessagePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePublisher")
            .field("provider", &self.connection.provider_name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl MessagePublisher {
    pub fn new(connection: Arc<dyn BrokerConnection>, retry: RetryPolicy) -> Self {
        Self {
            connection,
            work: WorkTopology::kitchen(),
            notifications: NotificationTopology::default(),
            retry,
        }
    }

    /// Persistent, priority-tagged publish to the orders exchange
    pub async fn publish_order(
        &self,
        message: &OrderMessage,
        cancel: &CancellationToken,
    ) -> KitchenResult<()> {
        let routing_key = order_routing_key(message.order_type, message.priority);
        let payload = message.to_bytes()?;
        let properties = PublishProperties::persistent().with_priority(message.priority.value() as u8);

        self.publish_with_retry(
            &self.work.exchange_spec(),
            &routing_key,
            &payload,
            properties,
            cancel,
        )
        .await?;

        debug!(
            order_number = %message.order_number,
            routing_key = %routing_key,
            "📤 Order published"
        );
        Ok(())
    }

    /// Transient publish to the notifications fan-out
    pub async fn publish_status_update(
        &self,
        message: &StatusUpdateMessage,
        cancel: &CancellationToken,
    ) -> KitchenResult<()> {
        let payload = message.to_bytes()?;
        self.publish_with_retry(
            &self.notifications.exchange_spec(),
            "",
            &payload,
            PublishProperties::transient(),
            cancel,
        )
        .await?;

        debug!(
            order_number = %message.order_number,
            new_status = %message.new_status,
            "📣 Status update published"
        );
        Ok(())
    }

    async fn publish_with_retry(
        &self,
        exchange: &ExchangeSpec,
        routing_key: &str,
        payload: &[u8],
        properties: PublishProperties,
        cancel: &CancellationToken,
    ) -> KitchenResult<()> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(KitchenError::Cancelled);
            }

            match self.try_publish(exchange, routing_key, payload, properties).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        exchange = %exchange.name,
                        routing_key = %routing_key,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Publish attempt failed"
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(KitchenError::Cancelled),
                    _ = tokio::time::sleep(self.retry.retry_delay) => {}
                }
            }
        }

        Err(KitchenError::PublishFailed {
            attempts: max_attempts,
            last_error,
        })
    }

    async fn try_publish(
        &self,
        exchange: &ExchangeSpec,
        routing_key: &str,
        payload: &[u8],
        properties: PublishProperties,
    ) -> MessagingResult<()> {
        let channel = self.connection.open_channel().await?;

        let result = async {
            channel.declare_exchange(exchange).await?;
            channel
                .publish(&exchange.name, routing_key, payload, properties)
                .await
        }
        .await;

        if let Err(e) = channel.close().await {
            debug!(error = %e, "Publisher channel close failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::broker::{BrokerChannel, InMemoryBroker, QueueSpec};
    use crate::messaging::topology::ConsumerTopology;
    use crate::models::{OrderItem, OrderType, Priority};
    use crate::state_machine::{OrderStatus, OrderTransition};

    fn order_message(priority: Priority) -> OrderMessage {
        OrderMessage {
            order_number: "ORD_20240115_001".to_string(),
            customer_name: "Jane".to_string(),
            order_type: OrderType::Delivery,
            table_number: None,
            delivery_address: Some("12 Baker Street".to_string()),
            items: vec![OrderItem {
                name: "Calzone".to_string(),
                quantity: 1,
                price: 120.0,
            }],
            total_amount: 120.0,
            priority,
        }
    }

    async fn bind_tap_queue(broker: &InMemoryBroker) -> Arc<dyn BrokerChannel> {
        let channel = broker.open_channel().await.unwrap();
        channel
            .declare_exchange(&WorkTopology::kitchen().exchange_spec())
            .await
            .unwrap();
        channel
            .declare_queue(&QueueSpec::durable("tap"))
            .await
            .unwrap();
        channel
            .bind_queue("tap", "orders_topic", "kitchen.#")
            .await
            .unwrap();
        channel
    }

    #[tokio::test]
    async fn test_order_publish_sets_routing_and_properties() {
        let broker = InMemoryBroker::new();
        let _tap = bind_tap_queue(&broker).await;
        let publisher = MessagePublisher::new(Arc::new(broker.clone()), RetryPolicy::default());

        publisher
            .publish_order(&order_message(Priority::High), &CancellationToken::new())
            .await
            .unwrap();

        let messages = broker.drain_queue("tap");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].routing_key, "kitchen.delivery.10");
        assert!(messages[0].persistent);
        assert_eq!(messages[0].priority, Some(10));
        assert_eq!(
            OrderMessage::from_bytes(&messages[0].payload).unwrap(),
            order_message(Priority::High)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let broker = InMemoryBroker::new();
        let _tap = bind_tap_queue(&broker).await;
        broker.fail_next_channel_opens(1);
        broker.fail_next_publishes(1);
        let publisher = MessagePublisher::new(Arc::new(broker.clone()), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        publisher
            .publish_order(&order_message(Priority::Low), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(4));
        assert_eq!(broker.queue_depth("tap"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_with_publish_failed() {
        let broker = InMemoryBroker::new();
        broker.fail_next_channel_opens(10);
        let publisher = MessagePublisher::new(Arc::new(broker.clone()), RetryPolicy::default());

        let err = publisher
            .publish_order(&order_message(Priority::Low), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KitchenError::PublishFailed { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_retry_wait() {
        let broker = InMemoryBroker::new();
        broker.fail_next_channel_opens(10);
        let publisher = MessagePublisher::new(Arc::new(broker.clone()), RetryPolicy::default());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = publisher
            .publish_order(&order_message(Priority::Low), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, KitchenError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_status_updates_are_transient_fanout() {
        let broker = InMemoryBroker::new();
        let subscriber = broker.open_channel().await.unwrap();
        let topology = NotificationTopology::default();
        let queue = topology.declare(subscriber.as_ref()).await.unwrap();

        let publisher = MessagePublisher::new(Arc::new(broker.clone()), RetryPolicy::default());
        let transition = OrderTransition::new(
            OrderStatus::Received,
            OrderStatus::Cooking,
            "chef_anna",
            chrono::Utc::now(),
        )
        .unwrap();
        let update = StatusUpdateMessage::from_transition("ORD_20240115_001", &transition);
        publisher
            .publish_status_update(&update, &CancellationToken::new())
            .await
            .unwrap();

        let messages = broker.drain_queue(&queue);
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].persistent);
        assert_eq!(messages[0].priority, None);
    }
}
