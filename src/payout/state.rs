//! Payout Status Definitions
//!
//! Status names are stored lowercase, matching the `payouts.status` column.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Payout lifecycle status
///
/// Terminal states: COMPLETED, FAILED, CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    /// Created, waiting for a worker
    Pending,

    /// Claimed by a worker, business check in progress
    Processing,

    /// Terminal: transfer accepted, `processed_at` stamped
    Completed,

    /// Terminal: business check rejected the payout, `failure_reason` recorded
    Failed,

    /// Terminal: cancelled before processing began
    Cancelled,
}

impl PayoutStatus {
    pub const ALL: [PayoutStatus; 5] = [
        PayoutStatus::Pending,
        PayoutStatus::Processing,
        PayoutStatus::Completed,
        PayoutStatus::Failed,
        PayoutStatus::Cancelled,
    ];

    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PayoutStatus::Completed | PayoutStatus::Failed | PayoutStatus::Cancelled
        )
    }

    /// Only PENDING payouts may be cancelled or deleted
    #[inline]
    pub fn can_be_cancelled(&self) -> bool {
        matches!(self, PayoutStatus::Pending)
    }

    /// Storage / wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
            PayoutStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PayoutStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown payout status: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PayoutStatus::Completed.is_terminal());
        assert!(PayoutStatus::Failed.is_terminal());
        assert!(PayoutStatus::Cancelled.is_terminal());

        assert!(!PayoutStatus::Pending.is_terminal());
        assert!(!PayoutStatus::Processing.is_terminal());
    }

    #[test]
    fn test_only_pending_can_be_cancelled() {
        for status in PayoutStatus::ALL {
            assert_eq!(status.can_be_cancelled(), status == PayoutStatus::Pending);
        }
    }

    #[test]
    fn test_parse_accepts_any_case() {
        assert_eq!("pending".parse(), Ok(PayoutStatus::Pending));
        assert_eq!("FAILED".parse(), Ok(PayoutStatus::Failed));
        assert!("settled".parse::<PayoutStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_storage_names() {
        let json = serde_json::to_string(&PayoutStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        let status: PayoutStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(status, PayoutStatus::Processing);
    }

    #[test]
    fn test_display() {
        assert_eq!(PayoutStatus::Pending.to_string(), "pending");
        assert_eq!(PayoutStatus::Completed.to_string(), "completed");
    }
}
