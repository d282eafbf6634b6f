//! # Persistence
//!
//! Orders, their status log, and kitchen workers. Services depend only on the
//! [`OrderRepository`] and [`WorkerRepository`] capabilities; the PostgreSQL
//! adapters run in production and the in-memory ones back the tests.

pub mod connection;
pub mod in_memory;
pub mod postgres;
pub mod repository;

pub use connection::{connect, health_check, run_migrations};
pub use in_memory::{InMemoryOrderRepository, InMemoryWorkerRepository};
pub use postgres::{PgOrderRepository, PgWorkerRepository};
pub use repository::{OrderRepository, WorkerRepository};
