#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, RabbitMQ in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Kitchen Core
//!
//! Restaurant order processing over PostgreSQL and RabbitMQ.
//!
//! ## Overview
//!
//! An intake service validates and persists orders, then publishes them to a
//! shared kitchen queue. Kitchen workers, each optionally specialised to a
//! subset of order types, consume that queue and drive every order through
//! `received -> cooking -> ready`. A tracking service serves the persisted
//! state, and notification subscribers print status changes as they are
//! broadcast.
//!
//! ## Delivery Semantics
//!
//! Delivery is at-least-once. Workers tolerate duplicates through an
//! idempotency guard (only `received` orders are cooked) and compare-and-set
//! status writes. A worker that cannot take an order's type hands it back to
//! the queue; any other handler failure parks the message in the dead-letter
//! queue.
//!
//! ## Module Organization
//!
//! - [`models`] - Orders, items, status log, workers
//! - [`state_machine`] - Order lifecycle transitions
//! - [`validation`] - Intake request validation
//! - [`messaging`] - Broker topology, publisher, dispatch loop
//! - [`database`] - Repository traits with PostgreSQL and in-memory adapters
//! - [`services`] - Intake, kitchen, tracking, notification roles
//! - [`web`] - HTTP surface for intake and tracking
//! - [`config`] - Layered configuration
//! - [`error`] - Error taxonomy and failure classification
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests (in-memory broker and store)
//! cargo test -- --ignored   # Tests needing live PostgreSQL / RabbitMQ
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod services;
pub mod state_machine;
pub mod utils;
pub mod validation;
pub mod web;

pub use config::{ConfigManager, KitchenConfig};
pub use error::{FailureClass, KitchenError, KitchenResult};
pub use models::{Order, OrderRequest, OrderType, Priority, Specialization, Worker};
pub use state_machine::OrderStatus;
