//! Payout Store Ports
//!
//! Every mutation runs inside a [`PayoutTx`]. `get_for_update` takes an exclusive
//! per-record lock that lives until the transaction commits or rolls back.
//! Dropping a transaction without committing rolls it back.

use async_trait::async_trait;

use super::error::PayoutError;
use super::types::{Payout, PayoutField, PayoutFilter, PayoutId};

/// Keyed payout storage
#[async_trait]
pub trait PayoutStore: Send + Sync {
    /// Committed read, no lock
    async fn get(&self, id: PayoutId) -> Result<Option<Payout>, PayoutError>;

    /// Committed records matching `filter`, newest first
    async fn list(&self, filter: &PayoutFilter) -> Result<Vec<Payout>, PayoutError>;

    /// Open a transaction
    async fn begin(&self) -> Result<Box<dyn PayoutTx>, PayoutError>;
}

/// A single store transaction
#[async_trait]
pub trait PayoutTx: Send {
    /// Lock the record exclusively, blocking while another transaction holds it
    async fn get_for_update(&mut self, id: PayoutId) -> Result<Option<Payout>, PayoutError>;

    /// Insert a new record
    async fn create(&mut self, payout: &Payout) -> Result<(), PayoutError>;

    /// Persist `fields` and `updated_at` of a record locked by this transaction
    async fn save(&mut self, payout: &Payout, fields: &[PayoutField]) -> Result<(), PayoutError>;

    /// Remove a record locked by this transaction
    async fn delete(&mut self, id: PayoutId) -> Result<(), PayoutError>;

    async fn commit(self: Box<Self>) -> Result<(), PayoutError>;

    async fn rollback(self: Box<Self>) -> Result<(), PayoutError>;
}
