//! # Kitchen Processing Service
//!
//! Drives the order state machine for one named worker. Each delivered order
//! moves `received -> cooking -> ready`, with a simulated cook in between whose
//! length depends only on the order type.
//!
//! Redelivery is expected: anything not still `received` is acknowledged
//! without side effects, and status writes are compare-and-set so a second
//! worker racing on the same order backs off instead of double-transitioning.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::constants::DEFAULT_HEARTBEAT_INTERVAL;
use crate::database::{OrderRepository, WorkerRepository};
use crate::error::{KitchenError, KitchenResult};
use crate::logging::{log_order_operation, log_worker_operation};
use crate::messaging::{
    ConsumerTopology, MessageConsumer, MessageHandler, MessagePublisher, OrderMessage,
    StatusUpdateMessage, WorkTopology,
};
use crate::messaging::routing::parse_order_routing_key;
use crate::models::{Order, OrderType, Specialization, Worker};
use crate::state_machine::{OrderStatus, OrderTransition};
use crate::utils::SharedClock;

pub struct KitchenService {
    worker_name: String,
    specialization: Specialization,
    orders: Arc<dyn OrderRepository>,
    workers: Arc<dyn WorkerRepository>,
    publisher: Arc<MessagePublisher>,
    clock: SharedClock,
    heartbeat_interval: Duration,
}

impl std::fmt::Debug for KitchenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KitchenService")
            .field("worker_name", &self.worker_name)
            .field("specialization", &self.specialization.to_string())
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish()
    }
}

impl KitchenService {
    pub fn new(
        worker_name: impl Into<String>,
        specialization: Specialization,
        orders: Arc<dyn OrderRepository>,
        workers: Arc<dyn WorkerRepository>,
        publisher: Arc<MessagePublisher>,
        clock: SharedClock,
    ) -> Self {
        Self {
            worker_name: worker_name.into(),
            specialization,
            orders,
            workers,
            publisher,
            clock,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    pub fn specialization(&self) -> &Specialization {
        &self.specialization
    }

    /// Register the worker and start its heartbeat
    ///
    /// Fails with `WorkerAlreadyOnline` if the stored row for this name is
    /// still online. The heartbeat runs until `cancel` fires.
    pub async fn start(&self, cancel: CancellationToken) -> KitchenResult<JoinHandle<()>> {
        let worker = self.register().await?;
        log_worker_operation(
            "register",
            &worker.name,
            worker.status.as_str(),
            Some(&format!("specialization={}", worker.specialization)),
        );

        let heartbeat = tokio::spawn(
            heartbeat_loop(
                Arc::clone(&self.workers),
                Arc::clone(&self.clock),
                self.worker_name.clone(),
                self.heartbeat_interval,
                cancel,
            )
            .in_current_span(),
        );
        Ok(heartbeat)
    }

    async fn register(&self) -> KitchenResult<Worker> {
        let now = self.clock.now();
        match self.workers.find_worker_by_name(&self.worker_name).await? {
            Some(mut worker) => {
                // Check-then-update is not atomic; two processes starting under
                // one name at the same moment can both pass
                worker.reactivate(self.specialization.clone(), now)?;
                self.workers.update_worker(&worker).await?;
                Ok(worker)
            }
            None => {
                let worker = Worker::new(&self.worker_name, self.specialization.clone(), now)?;
                self.workers.create_worker(&worker).await
            }
        }
    }

    /// Mark the worker offline
    pub async fn shutdown(&self) -> KitchenResult<()> {
        let mut worker = self
            .workers
            .find_worker_by_name(&self.worker_name)
            .await?
            .ok_or_else(|| KitchenError::WorkerNotFound(self.worker_name.clone()))?;
        worker.mark_offline();
        self.workers.update_worker(&worker).await?;

        log_worker_operation("shutdown", &worker.name, worker.status.as_str(), None);
        Ok(())
    }

    /// Start, consume the kitchen queue until `cancel`, then shut down
    pub async fn run(
        self: Arc<Self>,
        consumer: &MessageConsumer,
        cancel: CancellationToken,
    ) -> KitchenResult<()> {
        let heartbeat_cancel = cancel.child_token();
        let heartbeat = self.start(heartbeat_cancel.clone()).await?;

        let topology = WorkTopology::kitchen();
        info!(
            worker_name = %self.worker_name,
            queue = %topology.name(),
            "👨‍🍳 Kitchen worker consuming"
        );
        let consumed = consumer
            .consume(&topology, Arc::clone(&self), cancel)
            .await;

        heartbeat_cancel.cancel();
        if let Err(e) = heartbeat.await {
            warn!(error = %e, "Heartbeat task ended abnormally");
        }

        let shutdown = self.shutdown().await;
        consumed?;
        shutdown
    }

    /// Cook one order
    ///
    /// Returns `SpecializationMismatch` without touching the order when this
    /// worker does not take its type, and `Cancelled` if shutdown interrupts
    /// the cook; the order then stays `cooking`.
    pub async fn process_order(
        &self,
        message: &OrderMessage,
        cancel: &CancellationToken,
    ) -> KitchenResult<()> {
        if !self.specialization.accepts(message.order_type) {
            debug!(
                worker_name = %self.worker_name,
                order_number = %message.order_number,
                order_type = %message.order_type,
                "Order type outside specialization"
            );
            return Err(self.mismatch(message.order_type));
        }

        let mut order = self
            .orders
            .find_order_by_number(&message.order_number)
            .await?
            .ok_or_else(|| KitchenError::OrderNotFound(message.order_number.clone()))?;

        if order.status != OrderStatus::Received {
            info!(
                order_number = %order.number,
                status = %order.status,
                "Order already picked up, skipping redelivery"
            );
            return Ok(());
        }

        let started_at = self.clock.now();
        let Some(cooking) = self
            .advance(&mut order, OrderStatus::Cooking, started_at)
            .await?
        else {
            return Ok(());
        };
        let estimate = order.estimated_completion_from(started_at);
        self.notify(&order, &cooking, Some(estimate), cancel).await;

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(
                    order_number = %order.number,
                    "Cook interrupted by shutdown, order left cooking"
                );
                return Err(KitchenError::Cancelled);
            }
            _ = tokio::time::sleep(order.cooking_duration()) => {}
        }

        let ready_at = self.clock.now();
        let Some(ready) = self
            .advance(&mut order, OrderStatus::Ready, ready_at)
            .await?
        else {
            return Ok(());
        };
        self.notify(&order, &ready, None, cancel).await;

        if let Err(e) = self
            .workers
            .increment_processed_count(&self.worker_name)
            .await
        {
            warn!(
                worker_name = %self.worker_name,
                error = %e,
                "Failed to increment processed count"
            );
        }
        Ok(())
    }

    fn mismatch(&self, order_type: OrderType) -> KitchenError {
        KitchenError::SpecializationMismatch {
            worker_name: self.worker_name.clone(),
            order_type,
        }
    }

    /// Transition and persist; `None` if another writer moved the order first
    async fn advance(
        &self,
        order: &mut Order,
        target: OrderStatus,
        at: chrono::DateTime<chrono::Utc>,
    ) -> KitchenResult<Option<OrderTransition>> {
        let before = order.clone();
        let transition = order.transition_to(target, &self.worker_name, at)?;

        if !self.orders.update_order_status(order, &transition).await? {
            *order = before;
            info!(
                order_number = %order.number,
                target = %target,
                "Order changed concurrently, treating delivery as duplicate"
            );
            return Ok(None);
        }

        log_order_operation(
            "status_change",
            &order.number,
            target.as_str(),
            Some(&self.worker_name),
            Some(&format!("from={}", transition.from)),
        );
        Ok(Some(transition))
    }

    async fn notify(
        &self,
        order: &Order,
        transition: &OrderTransition,
        estimated_completion: Option<chrono::DateTime<chrono::Utc>>,
        cancel: &CancellationToken,
    ) {
        let mut update = StatusUpdateMessage::from_transition(&order.number, transition);
        if let Some(at) = estimated_completion {
            update = update.with_estimated_completion(at);
        }

        if let Err(e) = self.publisher.publish_status_update(&update, cancel).await {
            warn!(
                order_number = %order.number,
                new_status = %transition.to,
                error = %e,
                "Status notification not published"
            );
        }
    }
}

#[async_trait]
impl MessageHandler for KitchenService {
    /// A routing key naming a type this worker doesn't take is requeued
    /// before the payload is decoded. Keys that aren't order keys, such as
    /// those of dead-lettered messages, are ignored.
    async fn handle(
        &self,
        routing_key: &str,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> KitchenResult<()> {
        let routed = parse_order_routing_key(routing_key);
        if let Some((order_type, _)) = routed {
            if !self.specialization.accepts(order_type) {
                return Err(self.mismatch(order_type));
            }
        }

        let message = OrderMessage::from_bytes(payload)
            .map_err(|e| KitchenError::MalformedPayload(e.to_string()))?;

        if let Some((order_type, priority)) = routed {
            if (order_type, priority) != (message.order_type, message.priority) {
                return Err(KitchenError::MalformedPayload(format!(
                    "routing key {routing_key} disagrees with payload ({}, priority {})",
                    message.order_type,
                    message.priority.value()
                )));
            }
        }
        self.process_order(&message, cancel).await
    }
}

async fn heartbeat_loop(
    workers: Arc<dyn WorkerRepository>,
    clock: SharedClock,
    worker_name: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Registration already stamped last_seen
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match workers.touch_heartbeat(&worker_name, clock.now()).await {
            Ok(()) => debug!(worker_name = %worker_name, "💓 Heartbeat sent"),
            Err(e) => warn!(worker_name = %worker_name, error = %e, "Heartbeat failed"),
        }
    }
    debug!(worker_name = %worker_name, "Heartbeat stopped");
}
