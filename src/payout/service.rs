//! Payout Service
//!
//! Owns transaction boundaries for every payout operation. Each mutation follows
//! the same shape: lock the record, consult the transition table, persist, commit.
//! The service itself holds no mutable state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use validator::Validate;

use super::check::{PayoutCheck, Verdict};
use super::dispatcher::{PROCESS_PAYOUT_JOB, ProcessPayoutPayload, TaskDispatcher};
use super::error::PayoutError;
use super::fsm::{self, Action, Outcome};
use super::store::{PayoutStore, PayoutTx};
use super::types::{NewPayout, Payout, PayoutField, PayoutFilter, PayoutId, PayoutUpdate};

/// Payout Service - orchestrates the payout lifecycle
pub struct PayoutService {
    store: Arc<dyn PayoutStore>,
    dispatcher: Arc<dyn TaskDispatcher>,
    check: Arc<dyn PayoutCheck>,
}

impl PayoutService {
    pub fn new(
        store: Arc<dyn PayoutStore>,
        dispatcher: Arc<dyn TaskDispatcher>,
        check: Arc<dyn PayoutCheck>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            check,
        }
    }

    /// Create a PENDING payout and schedule its processing.
    ///
    /// The job is scheduled only after the creating transaction commits, so a
    /// worker can never pick up an id it cannot see yet.
    pub async fn create_payout(&self, input: NewPayout) -> Result<Payout, PayoutError> {
        input.validate()?;

        let payout = Payout::new(input, Utc::now());

        let mut tx = self.store.begin().await?;
        tx.create(&payout).await?;
        tx.commit().await?;

        info!(
            payout_id = %payout.id,
            amount = %payout.amount,
            currency = %payout.currency,
            "Payout created"
        );

        // The record is committed regardless; a lost job leaves it PENDING
        let scheduled = match ProcessPayoutPayload::new(payout.id).to_value() {
            Ok(payload) => self.dispatcher.schedule(PROCESS_PAYOUT_JOB, payload).await,
            Err(e) => Err(e),
        };
        if let Err(e) = scheduled {
            error!(payout_id = %payout.id, error = %e, "Failed to schedule payout processing");
        }

        Ok(payout)
    }

    /// Replace fields of a PENDING payout
    pub async fn update_payout(
        &self,
        id: PayoutId,
        changes: PayoutUpdate,
    ) -> Result<Payout, PayoutError> {
        changes.validate()?;

        let mut tx = self.store.begin().await?;
        let mut payout = Self::lock(tx.as_mut(), id).await?;

        let mut fields = Self::advance(&mut payout, Action::Update)?;
        fields.extend(changes.apply_to(&mut payout));

        tx.save(&payout, &fields).await?;
        tx.commit().await?;

        info!(payout_id = %id, fields = fields.len(), "Payout updated");
        Ok(payout)
    }

    /// Run the business check for a PENDING payout.
    ///
    /// Any other status is returned untouched, which makes duplicate job
    /// delivery and post-completion replays harmless. On rejection the FAILED
    /// state is committed before the error is returned.
    pub async fn process_payout(&self, id: PayoutId) -> Result<Payout, PayoutError> {
        let mut tx = self.store.begin().await?;
        let mut payout = Self::lock(tx.as_mut(), id).await?;

        match fsm::decide(payout.status, &Action::BeginProcessing) {
            Outcome::Advance { next, effect } => {
                let fields = payout.enter(next, effect, Utc::now());
                tx.save(&payout, &fields).await?;
            }
            Outcome::AlreadyHandled | Outcome::Conflict { .. } => {
                tx.commit().await?;
                debug!(payout_id = %id, status = %payout.status, "Payout already handled, skipping");
                return Ok(payout);
            }
        }

        debug!(payout_id = %id, "Payout processing");

        // Still holding the row lock
        let verdict = match self.check.evaluate(&payout).await {
            Ok(verdict) => verdict,
            Err(e) => Verdict::Reject(e.to_string()),
        };

        match verdict {
            Verdict::Accept => {
                let fields = Self::advance(&mut payout, Action::Complete)?;
                tx.save(&payout, &fields).await?;
                tx.commit().await?;
                info!(payout_id = %id, "Payout completed");
                Ok(payout)
            }
            Verdict::Reject(reason) => {
                let fields = Self::advance(&mut payout, Action::Fail(reason))?;
                tx.save(&payout, &fields).await?;
                tx.commit().await?;

                let reason = payout.failure_reason.clone().unwrap_or_default();
                warn!(payout_id = %id, reason = %reason, "Payout failed");
                Err(PayoutError::Processing(reason))
            }
        }
    }

    /// Cancel a payout that has not started processing
    pub async fn cancel_payout(&self, id: PayoutId) -> Result<Payout, PayoutError> {
        let mut tx = self.store.begin().await?;
        let mut payout = Self::lock(tx.as_mut(), id).await?;

        let fields = Self::advance(&mut payout, Action::Cancel)?;
        tx.save(&payout, &fields).await?;
        tx.commit().await?;

        info!(payout_id = %id, "Payout cancelled");
        Ok(payout)
    }

    /// Delete a payout; only PENDING records may be removed
    pub async fn delete_payout(&self, id: PayoutId) -> Result<(), PayoutError> {
        let mut tx = self.store.begin().await?;
        let payout = Self::lock(tx.as_mut(), id).await?;

        if !payout.status.can_be_cancelled() {
            return Err(PayoutError::StateConflict {
                action: "delete",
                current: payout.status,
            });
        }

        tx.delete(id).await?;
        tx.commit().await?;

        info!(payout_id = %id, "Payout deleted");
        Ok(())
    }

    pub async fn get_payout(&self, id: PayoutId) -> Result<Payout, PayoutError> {
        self.store
            .get(id)
            .await?
            .ok_or(PayoutError::NotFound(id))
    }

    pub async fn list_payouts(&self, filter: &PayoutFilter) -> Result<Vec<Payout>, PayoutError> {
        self.store.list(filter).await
    }

    async fn lock(tx: &mut dyn PayoutTx, id: PayoutId) -> Result<Payout, PayoutError> {
        tx.get_for_update(id)
            .await?
            .ok_or(PayoutError::NotFound(id))
    }

    /// Apply a transition that must be allowed, returning the changed fields
    fn advance(payout: &mut Payout, action: Action) -> Result<Vec<PayoutField>, PayoutError> {
        match fsm::decide(payout.status, &action) {
            Outcome::Advance { next, effect } => Ok(payout.enter(next, effect, Utc::now())),
            Outcome::AlreadyHandled | Outcome::Conflict { .. } => {
                Err(PayoutError::StateConflict {
                    action: action.name(),
                    current: payout.status,
                })
            }
        }
    }
}
