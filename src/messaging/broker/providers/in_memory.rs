//! # In-Memory Broker
//!
//! Thread-safe AMQP-style broker for testing and development.
//!
//! ## Features
//!
//! - **Exchange routing**: topic (`*`/`#` wildcards), direct and fanout
//! - **Dead-lettering**: nack without requeue follows the queue's
//!   dead-letter exchange, exactly like RabbitMQ's `x-dead-letter-*` args
//! - **Prefetch**: per-channel cap on unacknowledged deliveries
//! - **Channel close semantics**: unacknowledged deliveries are requeued and
//!   flagged as redelivered; exclusive and auto-delete queues are removed
//! - **Fault injection**: failing channel opens and publishes, and dropping
//!   every open channel to simulate a broker restart
//! - **Inspection**: queue depth, unacked counts and draining for assertions

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use tracing::debug;

use crate::messaging::broker::traits::{
    AutoAcked, BrokerChannel, BrokerConnection, DeliveryAcker, DeliveryStream,
};
use crate::messaging::broker::types::{
    AckMode, Delivery, ExchangeKind, ExchangeSpec, PublishProperties, QueueSpec,
};
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::routing::topic_matches;

/// A message as it sits in a queue
#[derive(Debug, Clone)]
struct StoredMessage {
    exchange: String,
    routing_key: String,
    payload: Vec<u8>,
    properties: PublishProperties,
    redelivered: bool,
}

/// Snapshot of a queued message returned by [`InMemoryBroker::drain_queue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub persistent: bool,
    pub priority: Option<u8>,
    pub redelivered: bool,
}

impl From<StoredMessage> for InspectedMessage {
    fn from(message: StoredMessage) -> Self {
        Self {
            exchange: message.exchange,
            routing_key: message.routing_key,
            payload: message.payload,
            persistent: message.properties.persistent,
            priority: message.properties.priority,
            redelivered: message.redelivered,
        }
    }
}

#[derive(Debug)]
struct ExchangeState {
    kind: ExchangeKind,
    /// (queue, binding key)
    bindings: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct ConsumerRef {
    channel_id: u64,
    tag: String,
}

#[derive(Debug)]
struct QueueState {
    spec: QueueSpec,
    owner_channel: Option<u64>,
    ready: VecDeque<StoredMessage>,
    consumers: Vec<ConsumerRef>,
    next_consumer: usize,
    had_consumer: bool,
}

impl QueueState {
    /// Effective priority; every message ranks equal on a non-priority queue
    fn rank(&self, message: &StoredMessage) -> u8 {
        match self.spec.max_priority {
            Some(max) => message.properties.priority.unwrap_or(0).min(max),
            None => 0,
        }
    }

    /// Behind every message of equal or higher priority
    fn enqueue(&mut self, message: StoredMessage) {
        let rank = self.rank(&message);
        let index = self
            .ready
            .iter()
            .position(|queued| self.rank(queued) < rank)
            .unwrap_or(self.ready.len());
        self.ready.insert(index, message);
    }

    /// Ahead of every message of equal or lower priority
    fn enqueue_front(&mut self, message: StoredMessage) {
        let rank = self.rank(&message);
        let index = self
            .ready
            .iter()
            .position(|queued| self.rank(queued) <= rank)
            .unwrap_or(self.ready.len());
        self.ready.insert(index, message);
    }
}

struct ConsumerState {
    queue: String,
    ack_mode: AckMode,
    sender: mpsc::UnboundedSender<MessagingResult<Delivery>>,
}

struct UnackedDelivery {
    queue: String,
    message: StoredMessage,
}

#[derive(Default)]
struct ChannelState {
    /// Zero means unlimited
    prefetch: u16,
    unacked: HashMap<u64, UnackedDelivery>,
    consumers: HashMap<String, ConsumerState>,
}

impl ChannelState {
    fn has_capacity(&self, consumer_tag: &str) -> bool {
        match self.consumers.get(consumer_tag) {
            Some(consumer) if consumer.ack_mode == AckMode::Auto => true,
            Some(_) => self.prefetch == 0 || self.unacked.len() < usize::from(self.prefetch),
            None => false,
        }
    }
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeState>,
    queues: HashMap<String, QueueState>,
    channels: HashMap<u64, ChannelState>,
    next_channel_id: u64,
    next_delivery_tag: u64,
    next_generated_name: u64,
    fail_channel_opens: u32,
    fail_publishes: u32,
    channels_opened: u64,
}

type SharedState = Arc<Mutex<BrokerState>>;

/// In-memory broker connection
///
/// Cloning shares the same broker, so a test can hold one handle for
/// inspection while services use another.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: SharedState,
}

impl fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryBroker")
            .field("exchanges", &state.exchanges.len())
            .field("queues", &state.queues.len())
            .field("open_channels", &state.channels.len())
            .finish()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` calls to `open_channel` fail with a connection error
    pub fn fail_next_channel_opens(&self, count: u32) {
        self.state.lock().fail_channel_opens = count;
    }

    /// The next `count` publishes fail
    pub fn fail_next_publishes(&self, count: u32) {
        self.state.lock().fail_publishes = count;
    }

    /// Simulate a broker restart: every consumer sees a connection error and
    /// every channel is closed
    pub fn disconnect_all(&self) {
        let mut state = self.state.lock();
        for channel in state.channels.values() {
            for consumer in channel.consumers.values() {
                let _ = consumer.sender.unbounded_send(Err(MessagingError::connection(
                    "connection reset by broker",
                )));
            }
        }
        let channel_ids: Vec<u64> = state.channels.keys().copied().collect();
        for channel_id in channel_ids {
            close_channel(&mut state, channel_id);
        }
        dispatch_all(&mut state, &self.state);
    }

    /// Ready (undelivered) messages in `queue`
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue)
            .map_or(0, |queue| queue.ready.len())
    }

    /// Delivered-but-unsettled messages taken from `queue`
    pub fn unacked_count(&self, queue: &str) -> usize {
        self.state
            .lock()
            .channels
            .values()
            .flat_map(|channel| channel.unacked.values())
            .filter(|unacked| unacked.queue == queue)
            .count()
    }

    /// Remove and return every ready message in `queue`
    pub fn drain_queue(&self, queue: &str) -> Vec<InspectedMessage> {
        self.state
            .lock()
            .queues
            .get_mut(queue)
            .map(|queue| queue.ready.drain(..).map(InspectedMessage::from).collect())
            .unwrap_or_default()
    }

    pub fn queue_exists(&self, queue: &str) -> bool {
        self.state.lock().queues.contains_key(queue)
    }

    pub fn exchange_kind(&self, exchange: &str) -> Option<ExchangeKind> {
        self.state.lock().exchanges.get(exchange).map(|e| e.kind)
    }

    /// (queue, binding key) pairs bound to `exchange`
    pub fn bindings(&self, exchange: &str) -> Vec<(String, String)> {
        self.state
            .lock()
            .exchanges
            .get(exchange)
            .map(|e| e.bindings.clone())
            .unwrap_or_default()
    }

    pub fn consumer_count(&self, queue: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue)
            .map_or(0, |queue| queue.consumers.len())
    }

    pub fn open_channel_count(&self) -> usize {
        self.state.lock().channels.len()
    }

    /// Channels successfully opened over the broker's lifetime
    pub fn channels_opened(&self) -> u64 {
        self.state.lock().channels_opened
    }
}

#[async_trait]
impl BrokerConnection for InMemoryBroker {
    async fn open_channel(&self) -> MessagingResult<Arc<dyn BrokerChannel>> {
        let mut state = self.state.lock();
        if state.fail_channel_opens > 0 {
            state.fail_channel_opens -= 1;
            return Err(MessagingError::connection("injected channel open failure"));
        }

        state.next_channel_id += 1;
        state.channels_opened += 1;
        let id = state.next_channel_id;
        state.channels.insert(id, ChannelState::default());

        Ok(Arc::new(InMemoryChannel {
            id,
            state: Arc::clone(&self.state),
        }))
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

struct InMemoryChannel {
    id: u64,
    state: SharedState,
}

impl InMemoryChannel {
    fn ensure_open(&self, state: &BrokerState) -> MessagingResult<()> {
        if state.channels.contains_key(&self.id) {
            Ok(())
        } else {
            Err(MessagingError::channel(format!("channel {} is closed", self.id)))
        }
    }
}

#[async_trait]
impl BrokerChannel for InMemoryChannel {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> MessagingResult<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        match state.exchanges.get(&spec.name) {
            Some(existing) if existing.kind != spec.kind => Err(MessagingError::topology(
                &spec.name,
                format!(
                    "PRECONDITION_FAILED - inequivalent arg 'type': received '{}' but current is '{}'",
                    spec.kind, existing.kind
                ),
            )),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(
                    spec.name.clone(),
                    ExchangeState {
                        kind: spec.kind,
                        bindings: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> MessagingResult<String> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        let name = if spec.is_server_named() {
            state.next_generated_name += 1;
            format!("amq.gen-{}", state.next_generated_name)
        } else {
            spec.name.clone()
        };

        if let Some(existing) = state.queues.get(&name) {
            return match existing.owner_channel {
                Some(owner) if owner != self.id => Err(MessagingError::topology(
                    &name,
                    "RESOURCE_LOCKED - cannot obtain exclusive access to locked queue",
                )),
                _ => Ok(name),
            };
        }

        let mut resolved = spec.clone();
        resolved.name = name.clone();
        state.queues.insert(
            name.clone(),
            QueueState {
                spec: resolved,
                owner_channel: spec.exclusive.then_some(self.id),
                ready: VecDeque::new(),
                consumers: Vec::new(),
                next_consumer: 0,
                had_consumer: false,
            },
        );
        Ok(name)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        binding_key: &str,
    ) -> MessagingResult<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        if !state.queues.contains_key(queue) {
            return Err(MessagingError::topology(queue, "NOT_FOUND - no queue"));
        }
        let exchange_state = state
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| MessagingError::topology(exchange, "NOT_FOUND - no exchange"))?;

        let binding = (queue.to_string(), binding_key.to_string());
        if !exchange_state.bindings.contains(&binding) {
            exchange_state.bindings.push(binding);
        }
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> MessagingResult<()> {
        let mut state = self.state.lock();
        let channel = state
            .channels
            .get_mut(&self.id)
            .ok_or_else(|| MessagingError::channel(format!("channel {} is closed", self.id)))?;
        channel.prefetch = count;
        dispatch_all(&mut state, &self.state);
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: PublishProperties,
    ) -> MessagingResult<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        if state.fail_publishes > 0 {
            state.fail_publishes -= 1;
            return Err(MessagingError::publish(
                exchange,
                routing_key,
                "injected publish failure",
            ));
        }

        let message = StoredMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
            properties,
            redelivered: false,
        };
        let routed = route_message(&mut state, exchange, routing_key, message)?;
        if routed == 0 {
            debug!(exchange, routing_key, "Message unroutable, dropped");
        }
        dispatch_all(&mut state, &self.state);
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        ack_mode: AckMode,
    ) -> MessagingResult<DeliveryStream> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        let tag = if consumer_tag.is_empty() {
            state.next_generated_name += 1;
            format!("amq.ctag-{}", state.next_generated_name)
        } else {
            consumer_tag.to_string()
        };

        let queue_state = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| MessagingError::consume(queue, "NOT_FOUND - no queue"))?;
        if matches!(queue_state.owner_channel, Some(owner) if owner != self.id) {
            return Err(MessagingError::consume(queue, "RESOURCE_LOCKED"));
        }
        queue_state.consumers.push(ConsumerRef {
            channel_id: self.id,
            tag: tag.clone(),
        });
        queue_state.had_consumer = true;

        let (sender, receiver) = mpsc::unbounded();
        if let Some(channel) = state.channels.get_mut(&self.id) {
            channel.consumers.insert(
                tag,
                ConsumerState {
                    queue: queue.to_string(),
                    ack_mode,
                    sender,
                },
            );
        }

        dispatch_all(&mut state, &self.state);
        Ok(receiver.boxed())
    }

    async fn close(&self) -> MessagingResult<()> {
        let mut state = self.state.lock();
        close_channel(&mut state, self.id);
        dispatch_all(&mut state, &self.state);
        Ok(())
    }
}

impl Drop for InMemoryChannel {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.channels.contains_key(&self.id) {
            close_channel(&mut state, self.id);
            dispatch_all(&mut state, &self.state);
        }
    }
}

struct InMemoryAcker {
    state: SharedState,
    channel_id: u64,
    delivery_tag: u64,
}

impl InMemoryAcker {
    fn settle(&self, requeue: Option<bool>) -> MessagingResult<()> {
        let mut state = self.state.lock();
        let channel = state.channels.get_mut(&self.channel_id).ok_or_else(|| {
            MessagingError::acknowledgement(self.delivery_tag, "channel is closed")
        })?;
        let unacked = channel.unacked.remove(&self.delivery_tag).ok_or_else(|| {
            MessagingError::acknowledgement(
                self.delivery_tag,
                "PRECONDITION_FAILED - unknown delivery tag",
            )
        })?;

        match requeue {
            None => {}
            Some(true) => requeue_front(&mut state, &unacked.queue, unacked.message),
            Some(false) => dead_letter(&mut state, &unacked.queue, unacked.message),
        }
        dispatch_all(&mut state, &self.state);
        Ok(())
    }
}

#[async_trait]
impl DeliveryAcker for InMemoryAcker {
    async fn ack(&self) -> MessagingResult<()> {
        self.settle(None)
    }

    async fn nack(&self, requeue: bool) -> MessagingResult<()> {
        self.settle(Some(requeue))
    }
}

/// Push `message` onto every queue the exchange routes `routing_key` to;
/// returns how many queues received it
fn route_message(
    state: &mut BrokerState,
    exchange: &str,
    routing_key: &str,
    message: StoredMessage,
) -> MessagingResult<usize> {
    let targets: Vec<String> = if exchange.is_empty() {
        // Default exchange routes by queue name
        if state.queues.contains_key(routing_key) {
            vec![routing_key.to_string()]
        } else {
            Vec::new()
        }
    } else {
        let exchange_state = state.exchanges.get(exchange).ok_or_else(|| {
            MessagingError::publish(exchange, routing_key, "NOT_FOUND - no exchange")
        })?;
        let mut targets: Vec<String> = Vec::new();
        for (queue, binding_key) in &exchange_state.bindings {
            let matched = match exchange_state.kind {
                ExchangeKind::Fanout => true,
                ExchangeKind::Direct => binding_key == routing_key,
                ExchangeKind::Topic => topic_matches(binding_key, routing_key),
            };
            if matched && !targets.contains(queue) {
                targets.push(queue.clone());
            }
        }
        targets
    };

    let mut routed = 0;
    for queue in &targets {
        if let Some(queue_state) = state.queues.get_mut(queue) {
            queue_state.enqueue(message.clone());
            routed += 1;
        }
    }
    Ok(routed)
}

fn requeue_front(state: &mut BrokerState, queue: &str, mut message: StoredMessage) {
    if let Some(queue_state) = state.queues.get_mut(queue) {
        message.redelivered = true;
        queue_state.enqueue_front(message);
    }
}

fn dead_letter(state: &mut BrokerState, queue: &str, mut message: StoredMessage) {
    let Some(queue_state) = state.queues.get(queue) else {
        return;
    };
    let Some(dead_letter_exchange) = queue_state.spec.dead_letter_exchange.clone() else {
        debug!(queue, "Rejected message dropped, queue has no dead-letter exchange");
        return;
    };
    let routing_key = queue_state
        .spec
        .dead_letter_routing_key
        .clone()
        .unwrap_or_else(|| message.routing_key.clone());

    message.redelivered = false;
    message.routing_key = routing_key.clone();
    if let Err(e) = route_message(state, &dead_letter_exchange, &routing_key, message) {
        debug!(queue, error = %e, "Dead-lettering failed, message dropped");
    }
}

/// Close a channel the way a broker does: cancel its consumers, requeue its
/// unacknowledged deliveries and delete queues that no longer have a reason
/// to exist
fn close_channel(state: &mut BrokerState, channel_id: u64) {
    let Some(channel) = state.channels.remove(&channel_id) else {
        return;
    };

    let mut unacked: Vec<(u64, UnackedDelivery)> = channel.unacked.into_iter().collect();
    unacked.sort_by_key(|(tag, _)| *tag);
    for (_, delivery) in unacked.into_iter().rev() {
        requeue_front(state, &delivery.queue, delivery.message);
    }

    for queue in state.queues.values_mut() {
        queue
            .consumers
            .retain(|consumer| consumer.channel_id != channel_id);
    }

    let doomed: Vec<String> = state
        .queues
        .iter()
        .filter(|(_, queue)| {
            queue.owner_channel == Some(channel_id)
                || (queue.spec.auto_delete && queue.had_consumer && queue.consumers.is_empty())
        })
        .map(|(name, _)| name.clone())
        .collect();
    for name in doomed {
        state.queues.remove(&name);
        for exchange in state.exchanges.values_mut() {
            exchange.bindings.retain(|(queue, _)| queue != &name);
        }
    }
}

fn dispatch_all(state: &mut BrokerState, shared: &SharedState) {
    let queue_names: Vec<String> = state.queues.keys().cloned().collect();
    for name in queue_names {
        dispatch_queue(state, shared, &name);
    }
}

/// Hand ready messages to consumers round-robin while any has capacity
fn dispatch_queue(state: &mut BrokerState, shared: &SharedState, queue_name: &str) {
    loop {
        let Some(queue) = state.queues.get_mut(queue_name) else {
            return;
        };
        if queue.ready.is_empty() || queue.consumers.is_empty() {
            return;
        }

        let consumer_count = queue.consumers.len();
        let chosen = (0..consumer_count)
            .map(|offset| (queue.next_consumer + offset) % consumer_count)
            .find(|&index| {
                let consumer = &queue.consumers[index];
                state
                    .channels
                    .get(&consumer.channel_id)
                    .is_some_and(|channel| channel.has_capacity(&consumer.tag))
            });
        let Some(index) = chosen else {
            return;
        };

        queue.next_consumer = (index + 1) % consumer_count;
        let consumer = queue.consumers[index].clone();
        let Some(message) = queue.ready.pop_front() else {
            return;
        };

        state.next_delivery_tag += 1;
        let delivery_tag = state.next_delivery_tag;

        let Some(channel) = state.channels.get_mut(&consumer.channel_id) else {
            return;
        };
        let Some(consumer_state) = channel.consumers.get(&consumer.tag) else {
            return;
        };
        let ack_mode = consumer_state.ack_mode;

        let acker: Box<dyn DeliveryAcker> = match ack_mode {
            AckMode::Manual => Box::new(InMemoryAcker {
                state: Arc::clone(shared),
                channel_id: consumer.channel_id,
                delivery_tag,
            }),
            AckMode::Auto => Box::new(AutoAcked),
        };
        let delivery = Delivery::new(
            delivery_tag,
            message.exchange.clone(),
            message.routing_key.clone(),
            message.payload.clone(),
            message.redelivered,
            acker,
        );

        if consumer_state.sender.unbounded_send(Ok(delivery)).is_err() {
            // Receiver dropped: cancel the consumer and put the message back
            channel.consumers.remove(&consumer.tag);
            if let Some(queue) = state.queues.get_mut(queue_name) {
                queue
                    .consumers
                    .retain(|c| !(c.channel_id == consumer.channel_id && c.tag == consumer.tag));
                queue.enqueue_front(message);
            }
            continue;
        }

        if ack_mode == AckMode::Manual {
            channel.unacked.insert(
                delivery_tag,
                UnackedDelivery {
                    queue: queue_name.to_string(),
                    message,
                },
            );
        }
    }
}
