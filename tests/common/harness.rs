//! In-process wiring of every role over the in-memory broker and store
//!
//! Services built here share one broker, one pair of repositories and one
//! clock that follows tokio time, so tests under `start_paused = true` see
//! persisted timestamps move with simulated cooking.

use std::sync::Arc;
use std::time::Duration;

use kitchen_core::database::{InMemoryOrderRepository, InMemoryWorkerRepository};
use kitchen_core::messaging::broker::{BrokerConnection, InMemoryBroker};
use kitchen_core::messaging::{
    ConsumerConfig, ConsumerTopology, MessageConsumer, MessagePublisher, RetryPolicy,
    WorkTopology,
};
use kitchen_core::models::{Order, OrderRequest, Specialization};
use kitchen_core::services::{KitchenService, OrderService, TrackingService};
use kitchen_core::state_machine::OrderStatus;
use kitchen_core::utils::{SharedClock, TokioClock};
use kitchen_core::KitchenResult;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const KITCHEN_QUEUE: &str = "kitchen_queue";
pub const KITCHEN_DLQ: &str = "kitchen_queue_dlq";

pub struct KitchenHarness {
    pub broker: InMemoryBroker,
    pub orders: Arc<InMemoryOrderRepository>,
    pub workers: Arc<InMemoryWorkerRepository>,
    pub publisher: Arc<MessagePublisher>,
    pub clock: SharedClock,
}

impl KitchenHarness {
    pub fn new() -> Self {
        let broker = InMemoryBroker::new();
        let publisher = MessagePublisher::new(Arc::new(broker.clone()), RetryPolicy::default());
        Self {
            broker,
            orders: Arc::new(InMemoryOrderRepository::new()),
            workers: Arc::new(InMemoryWorkerRepository::new()),
            publisher: Arc::new(publisher),
            clock: Arc::new(TokioClock::new()),
        }
    }

    /// Declare the work queue so orders published before any worker starts
    /// are retained
    pub async fn declare_work_topology(&self) {
        let channel = self.broker.open_channel().await.expect("open channel");
        WorkTopology::kitchen()
            .declare(channel.as_ref())
            .await
            .expect("declare work topology");
        channel.close().await.expect("close channel");
    }

    pub fn order_service(&self) -> OrderService {
        OrderService::new(
            self.orders.clone(),
            Arc::clone(&self.publisher),
            Arc::clone(&self.clock),
        )
    }

    pub fn kitchen_service(&self, name: &str, specialization: Specialization) -> KitchenService {
        KitchenService::new(
            name,
            specialization,
            self.orders.clone(),
            self.workers.clone(),
            Arc::clone(&self.publisher),
            Arc::clone(&self.clock),
        )
    }

    pub fn tracking_service(&self) -> TrackingService {
        TrackingService::new(
            self.orders.clone(),
            self.workers.clone(),
            Arc::clone(&self.clock),
        )
    }

    pub fn consumer(&self) -> MessageConsumer {
        MessageConsumer::new(Arc::new(self.broker.clone()), ConsumerConfig::default())
    }

    /// Run a worker on its own task until [`RunningWorker::stop`]
    pub fn spawn_worker(&self, service: KitchenService) -> RunningWorker {
        let consumer = self.consumer();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { Arc::new(service).run(&consumer, token).await });
        RunningWorker { cancel, handle }
    }

    pub async fn submit(&self, request: OrderRequest) -> Order {
        self.order_service()
            .create_order(request, &CancellationToken::new())
            .await
            .expect("order accepted")
    }

    pub async fn wait_for_consumers(&self, count: usize) {
        wait_until(|| self.broker.consumer_count(KITCHEN_QUEUE) == count).await;
    }

    pub async fn wait_for_status(&self, number: &str, status: OrderStatus) -> Order {
        let orders = Arc::clone(&self.orders);
        wait_until(|| orders.order(number).is_some_and(|order| order.status == status)).await;
        self.orders.order(number).expect("order exists")
    }

    /// Wait until the work queue holds nothing ready or unacknowledged
    pub async fn wait_for_idle_queue(&self) {
        wait_until(|| {
            self.broker.queue_depth(KITCHEN_QUEUE) == 0
                && self.broker.unacked_count(KITCHEN_QUEUE) == 0
        })
        .await;
    }
}

pub struct RunningWorker {
    pub cancel: CancellationToken,
    pub handle: JoinHandle<KitchenResult<()>>,
}

impl RunningWorker {
    pub async fn stop(self) -> KitchenResult<()> {
        self.cancel.cancel();
        self.handle.await.expect("worker task panicked")
    }
}

/// Poll `condition`, failing the test after a minute of (possibly simulated)
/// time
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 60s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
