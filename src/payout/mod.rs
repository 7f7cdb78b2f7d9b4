//! Payout Lifecycle
//!
//! Creation, asynchronous processing and cancellation of outbound payouts.
//!
//! # Architecture
//!
//! Every mutation runs inside a store transaction that holds an exclusive
//! per-record lock from read to commit:
//! - **Service** (`PayoutService`) validates input and owns the transactions
//! - **Store** (`PayoutStore`) in-memory or PostgreSQL (`SELECT ... FOR UPDATE`)
//! - **Dispatcher** (`TaskDispatcher`) receives `process_payout` jobs after commit
//! - **Worker** (`ProcessingWorker`) drains jobs with bounded retries
//!
//! # State Machine
//!
//! ```text
//! PENDING → PROCESSING → COMPLETED
//!    ↓           ↓
//! CANCELLED    FAILED
//! ```
//!
//! # Invariants
//!
//! 1. **Commit-Then-Schedule**: a job is never visible before its record
//! 2. **Terminal Is Final**: COMPLETED, FAILED and CANCELLED never change again
//! 3. **At-Most-Once Evaluation**: duplicate deliveries see a non-PENDING record and skip
//! 4. **Failure Is Persisted**: FAILED is committed before the processing error surfaces

pub mod check;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod fsm;
pub mod memory;
pub mod service;
pub mod state;
pub mod store;
pub mod types;
pub mod worker;


// Re-exports for convenience
pub use check::{LimitCheck, PayoutCheck, Verdict};
pub use db::PgPayoutStore;
pub use dispatcher::{
    ChannelDispatcher, Job, JobReceiver, PROCESS_PAYOUT_JOB, ProcessPayoutPayload,
    TaskDispatcher, job_channel,
};
pub use error::PayoutError;
pub use memory::InMemoryPayoutStore;
pub use service::PayoutService;
pub use state::PayoutStatus;
pub use store::{PayoutStore, PayoutTx};
pub use types::{Currency, NewPayout, Payout, PayoutFilter, PayoutId, PayoutUpdate};
pub use worker::{JobOutcome, ProcessingWorker, WorkerConfig, WorkerStats};
