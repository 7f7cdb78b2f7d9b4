//! Payout Engine
//!
//! Lifecycle management for outbound payouts: validated creation, a strict
//! status machine, and asynchronous processing through a job queue.
//!
//! # Modules
//!
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing subscriber setup
//! - [`payout`] - payout records, state machine, stores, service and worker

pub mod config;
pub mod logging;
pub mod payout;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use payout::{
    Currency, InMemoryPayoutStore, LimitCheck, NewPayout, Payout, PayoutError, PayoutFilter,
    PayoutId, PayoutService, PayoutStatus, PayoutUpdate, PgPayoutStore, ProcessingWorker,
    WorkerConfig, job_channel,
};
