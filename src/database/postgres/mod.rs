//! PostgreSQL adapters
//!
//! Runtime-checked `sqlx` queries against the schema in `migrations/`.

mod order_repository;
mod worker_repository;

pub use order_repository::PgOrderRepository;
pub use worker_repository::PgWorkerRepository;
