//! Kitchen Binary
//!
//! One executable, four process modes:
//!
//! ```bash
//! kitchen --mode order-service --port 3000
//! kitchen --mode kitchen-worker --worker-name chef_anna --order-types dine_in,takeout
//! kitchen --mode tracking-service --port 3002
//! kitchen --mode notification-subscriber
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};
use validator::Validate;

use kitchen_core::config::{ConfigManager, ConfigurationError, KitchenConfig};
use kitchen_core::constants::modes;
use kitchen_core::database::{self, PgOrderRepository, PgWorkerRepository};
use kitchen_core::logging::{init_tracing, log_error, service_span};
use kitchen_core::messaging::broker::{BrokerConnection, LapinBroker};
use kitchen_core::messaging::{ConsumerConfig, MessageConsumer, MessagePublisher, RetryPolicy};
use kitchen_core::models::Specialization;
use kitchen_core::services::{KitchenService, NotificationService, OrderService, TrackingService};
use kitchen_core::utils::system_clock;
use kitchen_core::web::state::{IntakeState, TrackingState};
use kitchen_core::web::{create_intake_app, create_tracking_app, serve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    OrderService,
    KitchenWorker,
    TrackingService,
    NotificationSubscriber,
}

impl Mode {
    fn service_name(self) -> &'static str {
        match self {
            Self::OrderService => modes::ORDER_SERVICE,
            Self::KitchenWorker => modes::KITCHEN_WORKER,
            Self::TrackingService => modes::TRACKING_SERVICE,
            Self::NotificationSubscriber => modes::NOTIFICATION_SUBSCRIBER,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "kitchen", version, about = "Restaurant order processing")]
struct Cli {
    /// Process role to run
    #[arg(long, value_enum)]
    mode: Mode,

    /// HTTP port for order-service and tracking-service [default: 3000]
    #[arg(long)]
    port: Option<u16>,

    /// Unique worker name (kitchen-worker)
    #[arg(long)]
    worker_name: Option<String>,

    /// Comma-separated order types this worker takes; omit for all
    #[arg(long, default_value = "")]
    order_types: String,

    /// Seconds between worker heartbeats [default: 30]
    #[arg(long)]
    heartbeat_interval: Option<u64>,

    /// Unacknowledged deliveries per worker [default: 1]
    #[arg(long)]
    prefetch: Option<u16>,

    /// Concurrent intake requests [default: 50]
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Configuration file [default: config.yaml when present]
    #[arg(long, env = "KITCHEN_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut KitchenConfig) {
        if let Some(port) = self.port {
            config.web.port = port;
        }
        if let Some(interval) = self.heartbeat_interval {
            config.worker.heartbeat_interval_seconds = interval;
        }
        if let Some(prefetch) = self.prefetch {
            config.worker.prefetch = prefetch;
        }
        if let Some(max_concurrent) = self.max_concurrent {
            config.web.max_concurrent_requests = max_concurrent;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::load(cli.config.as_deref()).context("loading configuration")?;
    let mut config = manager.config().clone();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(ConfigurationError::from)
        .context("applying command-line overrides")?;

    init_tracing(cli.mode.service_name(), manager.environment(), &config.logging);
    let span = service_span(cli.mode.service_name());
    run(&cli, &manager, &config).instrument(span).await
}

async fn run(cli: &Cli, manager: &ConfigManager, config: &KitchenConfig) -> anyhow::Result<()> {
    info!(
        mode = cli.mode.service_name(),
        environment = manager.environment(),
        source = %manager.source_path().display(),
        config = %ConfigManager::sanitize_config_for_logging(config),
        "🚀 Starting"
    );

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let result = match cli.mode {
        Mode::OrderService => run_order_service(config, shutdown).await,
        Mode::KitchenWorker => run_kitchen_worker(cli, config, shutdown).await,
        Mode::TrackingService => run_tracking_service(config, shutdown).await,
        Mode::NotificationSubscriber => run_notification_subscriber(config, shutdown).await,
    };

    match &result {
        Ok(()) => info!(mode = cli.mode.service_name(), "👋 Stopped"),
        Err(e) => log_error(cli.mode.service_name(), "run", &format!("{e:#}"), None),
    }
    result
}

async fn connect_broker(config: &KitchenConfig) -> anyhow::Result<Arc<LapinBroker>> {
    let broker = LapinBroker::connect(config.rabbitmq.clone())
        .await
        .with_context(|| format!("connecting to {}", config.rabbitmq.redacted_url()))?;
    Ok(Arc::new(broker))
}

async fn run_order_service(config: &KitchenConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let pool = database::connect(&config.database).await?;
    database::run_migrations(&pool).await?;
    let broker = connect_broker(config).await?;

    let publisher = MessagePublisher::new(
        Arc::clone(&broker) as Arc<dyn BrokerConnection>,
        RetryPolicy::from(&config.worker),
    );
    let service = OrderService::new(
        Arc::new(PgOrderRepository::new(pool.clone())),
        Arc::new(publisher),
        system_clock(),
    );

    let app = create_intake_app(IntakeState::new(Arc::new(service), shutdown.clone()), &config.web);
    serve(app, &config.web.bind_address(), shutdown).await?;

    broker.shutdown().await;
    pool.close().await;
    Ok(())
}

async fn run_kitchen_worker(
    cli: &Cli,
    config: &KitchenConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let Some(worker_name) = cli.worker_name.clone().filter(|name| !name.trim().is_empty()) else {
        bail!("--worker-name is required for kitchen-worker mode");
    };
    let specialization: Specialization = cli
        .order_types
        .parse()
        .map_err(|e: String| ConfigurationError::invalid_value("order_types", &cli.order_types, e))?;

    let pool = database::connect(&config.database).await?;
    let broker = connect_broker(config).await?;
    let connection = Arc::clone(&broker) as Arc<dyn BrokerConnection>;

    let publisher = MessagePublisher::new(Arc::clone(&connection), RetryPolicy::from(&config.worker));
    let service = KitchenService::new(
        worker_name.clone(),
        specialization,
        Arc::new(PgOrderRepository::new(pool.clone())),
        Arc::new(PgWorkerRepository::new(pool.clone())),
        Arc::new(publisher),
        system_clock(),
    )
    .with_heartbeat_interval(config.worker.heartbeat_interval());

    let consumer = MessageConsumer::new(
        connection,
        ConsumerConfig::from(&config.worker)
            .with_consumer_tag(format!("{worker_name}-{}", uuid::Uuid::new_v4())),
    );
    Arc::new(service).run(&consumer, shutdown).await?;

    broker.shutdown().await;
    pool.close().await;
    Ok(())
}

async fn run_tracking_service(config: &KitchenConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let pool = database::connect(&config.database).await?;
    database::run_migrations(&pool).await?;

    let service = TrackingService::new(
        Arc::new(PgOrderRepository::new(pool.clone())),
        Arc::new(PgWorkerRepository::new(pool.clone())),
        system_clock(),
    )
    .with_offline_threshold(config.tracking.worker_offline_threshold());

    let app = create_tracking_app(TrackingState::new(Arc::new(service)), &config.web);
    serve(app, &config.web.bind_address(), shutdown).await?;

    pool.close().await;
    Ok(())
}

async fn run_notification_subscriber(
    config: &KitchenConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let broker = connect_broker(config).await?;
    let consumer = MessageConsumer::new(
        Arc::clone(&broker) as Arc<dyn BrokerConnection>,
        ConsumerConfig::from(&config.worker),
    );

    Arc::new(NotificationService::stdout())
        .run(&consumer, shutdown)
        .await?;

    broker.shutdown().await;
    Ok(())
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(
        async move {
            wait_for_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        .in_current_span(),
    );
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
