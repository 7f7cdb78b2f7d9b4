//! Payout Transition Table
//!
//! Pure decision logic: `(current status, action) -> outcome`. No I/O, no clock.
//!
//! ```text
//! PENDING ──Update──▶ PENDING
//! PENDING ──BeginProcessing──▶ PROCESSING ──Complete──▶ COMPLETED
//!    │                              └───────Fail──────▶ FAILED
//!    └──Cancel──▶ CANCELLED
//! ```

use super::state::PayoutStatus;

/// Reason recorded when a rejection carries no message
pub const DEFAULT_FAILURE_REASON: &str = "Failed to process payout.";

/// Requested lifecycle action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Update,
    BeginProcessing,
    Complete,
    Fail(String),
    Cancel,
}

impl Action {
    /// Verb used in conflict messages
    pub fn name(&self) -> &'static str {
        match self {
            Action::Update => "update",
            Action::BeginProcessing => "process",
            Action::Complete => "complete",
            Action::Fail(_) => "fail",
            Action::Cancel => "cancel",
        }
    }
}

/// Side effect that accompanies a status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StampProcessedAt,
    RecordFailure(String),
}

/// Result of consulting the transition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Transition allowed
    Advance {
        next: PayoutStatus,
        effect: Option<Effect>,
    },
    /// Processing was already claimed or finished; return the record untouched
    AlreadyHandled,
    /// Action not permitted from the current status
    Conflict { current: PayoutStatus },
}

/// Decide what `action` does to a payout currently in `current`.
pub fn decide(current: PayoutStatus, action: &Action) -> Outcome {
    use PayoutStatus::*;

    match (current, action) {
        (Pending, Action::Update) => Outcome::Advance {
            next: Pending,
            effect: None,
        },
        (Pending, Action::BeginProcessing) => Outcome::Advance {
            next: Processing,
            effect: None,
        },
        (Processing, Action::Complete) => Outcome::Advance {
            next: Completed,
            effect: Some(Effect::StampProcessedAt),
        },
        (Processing, Action::Fail(reason)) => Outcome::Advance {
            next: Failed,
            effect: Some(Effect::RecordFailure(failure_reason(reason))),
        },
        (Pending, Action::Cancel) => Outcome::Advance {
            next: Cancelled,
            effect: None,
        },
        (Processing | Completed | Failed | Cancelled, Action::BeginProcessing) => {
            Outcome::AlreadyHandled
        }
        (current, _) => Outcome::Conflict { current },
    }
}

fn failure_reason(reason: &str) -> String {
    let reason = reason.trim();
    if reason.is_empty() {
        DEFAULT_FAILURE_REASON.to_string()
    } else {
        reason.to_string()
    }
}
