//! In-Memory Payout Store
//!
//! Committed rows live behind a `tokio::sync::RwLock`. Row locks come from a
//! per-id `tokio::sync::Mutex` table; a transaction keeps the owned guards and
//! its staged writes until commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::error::PayoutError;
use super::store::{PayoutStore, PayoutTx};
use super::types::{Payout, PayoutField, PayoutFilter, PayoutId};

type Rows = Arc<RwLock<HashMap<PayoutId, Payout>>>;
type LockTable = Arc<DashMap<PayoutId, Arc<Mutex<()>>>>;

/// A thread-safe in-memory payout store with per-record locking.
///
/// Clones share the same rows and lock table.
#[derive(Default, Clone)]
pub struct InMemoryPayoutStore {
    rows: Rows,
    locks: LockTable,
}

impl InMemoryPayoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids with a live row lock entry
    pub fn lock_entries(&self) -> usize {
        self.locks.len()
    }
}

#[async_trait]
impl PayoutStore for InMemoryPayoutStore {
    async fn get(&self, id: PayoutId) -> Result<Option<Payout>, PayoutError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).cloned())
    }

    async fn list(&self, filter: &PayoutFilter) -> Result<Vec<Payout>, PayoutError> {
        let rows = self.rows.read().await;
        let mut payouts: Vec<Payout> = rows
            .values()
            .filter(|payout| filter.matches(payout))
            .cloned()
            .collect();
        payouts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(payouts)
    }

    async fn begin(&self) -> Result<Box<dyn PayoutTx>, PayoutError> {
        Ok(Box::new(InMemoryTx {
            rows: self.rows.clone(),
            locks: self.locks.clone(),
            held: HashMap::new(),
            staged: HashMap::new(),
        }))
    }
}

/// Transaction over [`InMemoryPayoutStore`]
pub struct InMemoryTx {
    rows: Rows,
    locks: LockTable,
    held: HashMap<PayoutId, OwnedMutexGuard<()>>,
    /// `None` marks a deletion
    staged: HashMap<PayoutId, Option<Payout>>,
}

impl InMemoryTx {
    async fn lock(&mut self, id: PayoutId) {
        if self.held.contains_key(&id) {
            return;
        }
        let lock = self.locks.entry(id).or_default().value().clone();
        let guard = lock.lock_owned().await;
        self.held.insert(id, guard);
    }

    /// Release the row lock and drop its table entry unless another
    /// transaction is waiting on it
    fn unlock(&mut self, id: PayoutId) {
        if let Some(guard) = self.held.remove(&id) {
            drop(guard);
            self.locks
                .remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
        }
    }

    fn ensure_locked(&self, id: PayoutId) -> Result<(), PayoutError> {
        if self.held.contains_key(&id) {
            Ok(())
        } else {
            Err(PayoutError::System(format!(
                "Payout {} is not locked by this transaction",
                id
            )))
        }
    }

    /// Row as seen by this transaction: staged write first, then committed state
    async fn current(&self, id: PayoutId) -> Option<Payout> {
        if let Some(staged) = self.staged.get(&id) {
            return staged.clone();
        }
        self.rows.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl PayoutTx for InMemoryTx {
    async fn get_for_update(&mut self, id: PayoutId) -> Result<Option<Payout>, PayoutError> {
        self.lock(id).await;
        let row = self.current(id).await;
        if row.is_none() && !self.staged.contains_key(&id) {
            self.unlock(id);
        }
        Ok(row)
    }

    async fn create(&mut self, payout: &Payout) -> Result<(), PayoutError> {
        self.lock(payout.id).await;
        if self.current(payout.id).await.is_some() {
            return Err(PayoutError::Database(format!(
                "Payout {} already exists",
                payout.id
            )));
        }
        self.staged.insert(payout.id, Some(payout.clone()));
        Ok(())
    }

    async fn save(&mut self, payout: &Payout, fields: &[PayoutField]) -> Result<(), PayoutError> {
        self.ensure_locked(payout.id)?;
        let mut row = self
            .current(payout.id)
            .await
            .ok_or(PayoutError::NotFound(payout.id))?;
        row.copy_fields(payout, fields);
        self.staged.insert(payout.id, Some(row));
        Ok(())
    }

    async fn delete(&mut self, id: PayoutId) -> Result<(), PayoutError> {
        self.ensure_locked(id)?;
        self.staged.insert(id, None);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PayoutError> {
        let mut tx = self;
        let staged = std::mem::take(&mut tx.staged);
        {
            let mut rows = tx.rows.write().await;
            for (id, row) in staged {
                match row {
                    Some(row) => {
                        rows.insert(id, row);
                    }
                    None => {
                        rows.remove(&id);
                    }
                }
            }
        }

        // Locks are released on drop, after the writes are visible
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PayoutError> {
        drop(self);
        Ok(())
    }
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        let ids: Vec<PayoutId> = self.held.keys().copied().collect();
        for id in ids {
            self.unlock(id);
        }
    }
}
