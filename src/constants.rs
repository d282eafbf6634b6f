//! # System Constants
//!
//! Broker names, actor identities, and operational defaults shared by every
//! process mode. Topology names are wire-level contracts with already-deployed
//! brokers, so changing any of them is a migration, not a refactor.

use std::time::Duration;

/// Broker exchange and queue names
pub mod topology {
    /// Topic exchange that carries order dispatch messages
    pub const ORDERS_EXCHANGE: &str = "orders_topic";
    /// Direct exchange that receives messages rejected by the work queue
    pub const DEAD_LETTER_EXCHANGE: &str = "orders_dlq";
    /// Shared work queue consumed by every kitchen worker
    pub const KITCHEN_QUEUE: &str = "kitchen_queue";
    /// Parking queue for dead-lettered orders
    pub const KITCHEN_DEAD_LETTER_QUEUE: &str = "kitchen_queue_dlq";
    /// Fan-out exchange for status-change notifications
    pub const NOTIFICATIONS_EXCHANGE: &str = "notifications_fanout";

    /// Routing-key role segment for kitchen dispatch
    pub const KITCHEN_ROLE: &str = "kitchen";
    /// Work-queue binding: every order type and priority under the role
    pub const KITCHEN_BINDING: &str = "kitchen.#";
    /// Routing key dead letters are re-published with; the parking queue
    /// binds on it
    pub const DEAD_LETTER_ROUTING_KEY: &str = KITCHEN_QUEUE;

    /// Queue argument naming the dead-letter exchange
    pub const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";
    /// Queue argument overriding the routing key of dead letters
    pub const DEAD_LETTER_ROUTING_KEY_ARG: &str = "x-dead-letter-routing-key";
    /// Queue argument enabling per-message priority
    pub const MAX_PRIORITY_ARG: &str = "x-max-priority";

    /// Highest priority the work queue honours; matches `Priority::High`
    pub const KITCHEN_MAX_PRIORITY: u8 = 10;
}

/// Actor names recorded in the status log
pub mod actors {
    /// Actor recorded for the initial `received` status entry
    pub const ORDER_SERVICE: &str = "order-service";
}

/// Process modes selectable from the command line
pub mod modes {
    pub const ORDER_SERVICE: &str = "order-service";
    pub const KITCHEN_WORKER: &str = "kitchen-worker";
    pub const TRACKING_SERVICE: &str = "tracking-service";
    pub const NOTIFICATION_SUBSCRIBER: &str = "notification-subscriber";
}

/// Publisher attempts before surfacing `PublishFailed`
pub const DEFAULT_PUBLISH_MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between publish attempts
pub const DEFAULT_PUBLISH_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Fixed backoff before the dispatch loop reconnects
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Default worker heartbeat interval
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Age of `last_seen` after which tracking reports a worker offline
pub const DEFAULT_WORKER_OFFLINE_THRESHOLD: Duration = Duration::from_secs(60);

/// Default broker prefetch (unacknowledged deliveries per worker)
pub const DEFAULT_PREFETCH: u16 = 1;

/// Worker type stored for workers without a specialization
pub const GENERAL_WORKER_TYPE: &str = "general";

/// Order numbers look like `ORD_20240115_007`
pub const ORDER_NUMBER_PREFIX: &str = "ORD";

/// Content type of every published payload
pub const JSON_CONTENT_TYPE: &str = "application/json";
