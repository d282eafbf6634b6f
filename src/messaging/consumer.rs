//! # Dispatch Loop
//!
//! Streams deliveries from a [`ConsumerTopology`], runs each through a
//! [`MessageHandler`] on its own task, and settles it according to the
//! handler's failure classification:
//!
//! | Handler result                  | Settlement                         |
//! |---------------------------------|------------------------------------|
//! | `Ok(())`                        | ack                                |
//! | `SpecializationMismatch`        | nack, requeue (another worker)     |
//! | `Cancelled`                     | none; channel close requeues it    |
//! | anything else                   | nack, no requeue (dead-letter)     |
//!
//! A closed channel or connection is not fatal: the loop backs off and sets
//! everything up again until cancelled. Only non-recoverable setup errors end
//! it early.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::WorkerConfig;
use crate::constants::{DEFAULT_PREFETCH, DEFAULT_RECONNECT_BACKOFF};
use crate::error::{FailureClass, KitchenError, KitchenResult};
use crate::messaging::broker::{AckMode, BrokerChannel, BrokerConnection, Delivery};
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::topology::ConsumerTopology;

/// Processes one delivered payload
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// `routing_key` is the key the message was published (or dead-lettered) with
    async fn handle(
        &self,
        routing_key: &str,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> KitchenResult<()>;
}

/// What the dispatch loop does with a delivery after the handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Ack,
    Requeue,
    DeadLetter,
    /// Leave unsettled; the broker requeues it when the channel closes
    Abandon,
}

impl DeliveryOutcome {
    pub fn from_result(result: &KitchenResult<()>) -> Self {
        match result {
            Ok(()) => Self::Ack,
            Err(e) => match e.failure_class() {
                FailureClass::SpecializationMismatch => Self::Requeue,
                FailureClass::Cancelled => Self::Abandon,
                _ => Self::DeadLetter,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Broker prefetch, and the cap on concurrently running handlers
    pub prefetch: u16,
    pub reconnect_backoff: Duration,
    /// Empty lets the broker pick one
    pub consumer_tag: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            prefetch: DEFAULT_PREFETCH,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            consumer_tag: String::new(),
        }
    }
}

impl From<&WorkerConfig> for ConsumerConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            prefetch: config.prefetch,
            reconnect_backoff: config.reconnect_backoff(),
            consumer_tag: String::new(),
        }
    }
}

impl ConsumerConfig {
    pub fn with_consumer_tag(mut self, tag: impl Into<String>) -> Self {
        self.consumer_tag = tag.into();
        self
    }
}

/// Why a consuming session ended without an error
enum SessionEnd {
    Cancelled,
}

pub struct MessageConsumer {
    connection: Arc<dyn BrokerConnection>,
    config: ConsumerConfig,
}

impl std::fmt::Debug for MessageConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageConsumer")
            .field("provider", &self.connection.provider_name())
            .field("config", &self.config)
            .finish()
    }
}

impl MessageConsumer {
    pub fn new(connection: Arc<dyn BrokerConnection>, config: ConsumerConfig) -> Self {
        Self { connection, config }
    }

    /// Run until `cancel` fires or setup fails unrecoverably
    ///
    /// In-flight handlers are awaited before returning so their settlements
    /// reach the broker.
    pub async fn consume<T, H>(
        &self,
        topology: &T,
        handler: Arc<H>,
        cancel: CancellationToken,
    ) -> KitchenResult<()>
    where
        T: ConsumerTopology + ?Sized,
        H: MessageHandler + ?Sized,
    {
        let permits = Arc::new(Semaphore::new(usize::from(self.config.prefetch.max(1))));
        let mut in_flight: JoinSet<()> = JoinSet::new();

        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }

            match self
                .run_session(topology, &handler, &permits, &mut in_flight, &cancel)
                .await
            {
                Ok(SessionEnd::Cancelled) => break Ok(()),
                Err(e) if !e.is_recoverable() => {
                    error!(
                        topology = %topology.name(),
                        error = %e,
                        "❌ Consumer setup failed unrecoverably"
                    );
                    break Err(KitchenError::from(e));
                }
                Err(e) => {
                    warn!(
                        topology = %topology.name(),
                        error = %e,
                        backoff_secs = self.config.reconnect_backoff.as_secs(),
                        "🔌 Consumer disconnected, reconnecting after backoff"
                    );
                }
            }

            if cancel.is_cancelled() {
                break Ok(());
            }
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                _ = tokio::time::sleep(self.config.reconnect_backoff) => {}
            }
        };

        while let Some(joined) = in_flight.join_next().await {
            log_join_result(joined);
        }
        info!(topology = %topology.name(), "Consumer stopped");
        result
    }

    async fn run_session<T, H>(
        &self,
        topology: &T,
        handler: &Arc<H>,
        permits: &Arc<Semaphore>,
        in_flight: &mut JoinSet<()>,
        cancel: &CancellationToken,
    ) -> MessagingResult<SessionEnd>
    where
        T: ConsumerTopology + ?Sized,
        H: MessageHandler + ?Sized,
    {
        let channel = self.connection.open_channel().await?;
        let result = self
            .consume_on_channel(channel.as_ref(), topology, handler, permits, in_flight, cancel)
            .await;

        if matches!(result, Ok(SessionEnd::Cancelled)) {
            // Settle what is already running before the channel goes away
            while let Some(joined) = in_flight.join_next().await {
                log_join_result(joined);
            }
        }
        if let Err(e) = channel.close().await {
            debug!(error = %e, "Consumer channel close failed");
        }
        result
    }

    async fn consume_on_channel<T, H>(
        &self,
        channel: &dyn BrokerChannel,
        topology: &T,
        handler: &Arc<H>,
        permits: &Arc<Semaphore>,
        in_flight: &mut JoinSet<()>,
        cancel: &CancellationToken,
    ) -> MessagingResult<SessionEnd>
    where
        T: ConsumerTopology + ?Sized,
        H: MessageHandler + ?Sized,
    {
        let ack_mode = topology.ack_mode();
        if ack_mode == AckMode::Manual {
            channel.set_prefetch(self.config.prefetch).await?;
        }
        let queue = topology.declare(channel).await?;
        let mut deliveries = channel
            .consume(&queue, &self.config.consumer_tag, ack_mode)
            .await?;

        info!(
            queue = %queue,
            prefetch = self.config.prefetch,
            "🎧 Consuming"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                next = deliveries.next() => next,
            };

            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => return Err(e),
                None => return Err(MessagingError::channel(format!(
                    "delivery stream for {queue} closed"
                ))),
            };

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                permit = Arc::clone(permits).acquire_owned() => permit
                    .map_err(|_| MessagingError::channel("handler permits closed"))?,
            };

            let handler = Arc::clone(handler);
            let cancel = cancel.clone();
            in_flight.spawn(
                async move {
                    let _permit = permit;
                    process_delivery(handler.as_ref(), delivery, ack_mode, &cancel).await;
                }
                .in_current_span(),
            );

            while let Some(joined) = in_flight.try_join_next() {
                log_join_result(joined);
            }
        }
    }
}

async fn process_delivery<H>(
    handler: &H,
    delivery: Delivery,
    ack_mode: AckMode,
    cancel: &CancellationToken,
) where
    H: MessageHandler + ?Sized,
{
    let result = handler
        .handle(&delivery.routing_key, &delivery.payload, cancel)
        .await;
    let outcome = DeliveryOutcome::from_result(&result);

    if let Err(e) = &result {
        let classification = e.failure_class();
        match outcome {
            DeliveryOutcome::Requeue => warn!(
                delivery_tag = delivery.delivery_tag,
                routing_key = %delivery.routing_key,
                classification = %classification,
                error = %e,
                "↩️ Requeueing delivery for another worker"
            ),
            DeliveryOutcome::Abandon => info!(
                delivery_tag = delivery.delivery_tag,
                classification = %classification,
                "Processing interrupted, leaving delivery for redelivery"
            ),
            _ => error!(
                delivery_tag = delivery.delivery_tag,
                routing_key = %delivery.routing_key,
                classification = %classification,
                error = %e,
                "☠️ Handler failed, rejecting delivery"
            ),
        }
    }

    if ack_mode == AckMode::Auto {
        return;
    }

    let settled = match outcome {
        DeliveryOutcome::Ack => delivery.ack().await,
        DeliveryOutcome::Requeue => delivery.nack(true).await,
        DeliveryOutcome::DeadLetter => delivery.nack(false).await,
        DeliveryOutcome::Abandon => Ok(()),
    };
    if let Err(e) = settled {
        warn!(
            delivery_tag = delivery.delivery_tag,
            outcome = ?outcome,
            error = %e,
            "Failed to settle delivery; broker will redeliver"
        );
    }
}

fn log_join_result(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Message handler task panicked");
    }
}
