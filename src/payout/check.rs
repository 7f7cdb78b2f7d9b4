//! Business Check
//!
//! The pluggable decision step run while a payout is locked in PROCESSING.
//! It decides completion vs. failure; it never moves funds itself.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::types::Payout;
use crate::config::ProcessingConfig;

pub const AMOUNT_EXCEEDS_LIMIT: &str = "Amount exceeds limit.";
pub const INVALID_RECIPIENT: &str = "Invalid recipient.";

/// Result of evaluating a payout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

/// Decision step consulted by `PayoutService::process_payout`.
///
/// An `Err` is treated as a rejection whose reason is the error message.
#[async_trait]
pub trait PayoutCheck: Send + Sync {
    async fn evaluate(&self, payout: &Payout) -> anyhow::Result<Verdict>;
}

/// Amount ceiling plus recipient-name denylist
#[derive(Debug, Clone)]
pub struct LimitCheck {
    amount_limit: Decimal,
    denylist_marker: String,
}

impl LimitCheck {
    pub fn new(amount_limit: Decimal, denylist_marker: impl Into<String>) -> Self {
        Self {
            amount_limit,
            denylist_marker: denylist_marker.into().to_uppercase(),
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(config.amount_limit, config.recipient_denylist_marker.clone())
    }
}

impl Default for LimitCheck {
    fn default() -> Self {
        Self::from_config(&ProcessingConfig::default())
    }
}

#[async_trait]
impl PayoutCheck for LimitCheck {
    async fn evaluate(&self, payout: &Payout) -> anyhow::Result<Verdict> {
        if payout.amount > self.amount_limit {
            return Ok(Verdict::Reject(AMOUNT_EXCEEDS_LIMIT.to_string()));
        }
        if !self.denylist_marker.is_empty()
            && payout
                .recipient_name
                .to_uppercase()
                .contains(&self.denylist_marker)
        {
            return Ok(Verdict::Reject(INVALID_RECIPIENT.to_string()));
        }
        Ok(Verdict::Accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::types::{Currency, NewPayout};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn payout(amount: Decimal, name: &str) -> Payout {
        Payout::new(
            NewPayout::new(amount, Currency::Usd, name, "DE89370400440532013000"),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_accepts_ordinary_payout() {
        let check = LimitCheck::default();
        let verdict = check.evaluate(&payout(dec!(100.50), "Jane Doe")).await.unwrap();
        assert_eq!(verdict, Verdict::Accept);
    }

    #[tokio::test]
    async fn test_amount_limit_is_inclusive() {
        let check = LimitCheck::default();
        assert_eq!(
            check.evaluate(&payout(dec!(1000000), "Jane Doe")).await.unwrap(),
            Verdict::Accept
        );
        assert_eq!(
            check.evaluate(&payout(dec!(1000000.01), "Jane Doe")).await.unwrap(),
            Verdict::Reject(AMOUNT_EXCEEDS_LIMIT.into())
        );
    }

    #[tokio::test]
    async fn test_denylist_marker_any_case() {
        let check = LimitCheck::default();
        for name in ["TEST_FAIL", "john test_fail doe", "Test_Fail Ltd"] {
            assert_eq!(
                check.evaluate(&payout(dec!(10), name)).await.unwrap(),
                Verdict::Reject(INVALID_RECIPIENT.into()),
                "{} should be rejected",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_amount_checked_before_recipient() {
        let check = LimitCheck::default();
        assert_eq!(
            check.evaluate(&payout(dec!(1500000), "TEST_FAIL")).await.unwrap(),
            Verdict::Reject(AMOUNT_EXCEEDS_LIMIT.into())
        );
    }

    #[tokio::test]
    async fn test_custom_limits() {
        let check = LimitCheck::new(dec!(50), "blocked");
        assert_eq!(
            check.evaluate(&payout(dec!(51), "Jane Doe")).await.unwrap(),
            Verdict::Reject(AMOUNT_EXCEEDS_LIMIT.into())
        );
        assert_eq!(
            check.evaluate(&payout(dec!(5), "BLOCKED party")).await.unwrap(),
            Verdict::Reject(INVALID_RECIPIENT.into())
        );
    }
}
