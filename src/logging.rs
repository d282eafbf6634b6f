//! # Structured Logging Module
//!
//! Environment-aware structured logging for every process mode. Production
//! emits JSON lines at `info`; other environments default to `debug`.
//! `RUST_LOG` overrides both.

use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the global subscriber once; later calls are no-ops
pub fn init_tracing(service: &str, environment: &str, config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let directive = config
            .level
            .clone()
            .unwrap_or_else(|| default_log_level(environment).to_string());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

        let layer = match config.format {
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .boxed(),
            LogFormat::Console => fmt::layer()
                .with_target(true)
                .with_ansi(std::io::stdout().is_terminal())
                .boxed(),
        };

        // Tests and embedders may already have installed a subscriber
        if tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            service = %service,
            pid = std::process::id(),
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Root span for a process; every record logged inside it carries the
/// `service` and `hostname` fields
///
/// Tasks spawned while it is current must be instrumented with
/// `in_current_span()` to stay inside it.
pub fn service_span(service: &str) -> tracing::Span {
    tracing::info_span!("service", service = %service, hostname = %hostname())
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Default `EnvFilter` directive for an environment name
pub fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for order lifecycle operations
pub fn log_order_operation(
    operation: &str,
    order_number: &str,
    status: &str,
    actor: Option<&str>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        order_number = %order_number,
        status = %status,
        actor = actor,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 ORDER_OPERATION"
    );
}

/// Log structured data for kitchen worker lifecycle operations
pub fn log_worker_operation(operation: &str, worker_name: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        worker_name = %worker_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "👨‍🍳 WORKER_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
