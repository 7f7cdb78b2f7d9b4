//! Payout Core Types
//!
//! The `Payout` record plus the input shapes accepted from the API layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::fsm::Effect;
use super::state::PayoutStatus;

/// Fixed number of fractional digits for payout amounts
pub const AMOUNT_SCALE: u32 = 2;

/// Payout identifier - random UUID v4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayoutId(Uuid);

impl PayoutId {
    /// Generate a new unique PayoutId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PayoutId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PayoutId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Supported payout currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Rub,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Rub => "RUB",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "RUB" => Ok(Currency::Rub),
            _ => Err(format!("Unsupported currency: {}", s)),
        }
    }
}

/// Columns a transition or update may touch. `updated_at` is always written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayoutField {
    Amount,
    Currency,
    RecipientName,
    RecipientAccount,
    RecipientBankCode,
    Description,
    Status,
    FailureReason,
    ProcessedAt,
}

impl PayoutField {
    /// Column name in the `payouts` table
    pub fn column(&self) -> &'static str {
        match self {
            PayoutField::Amount => "amount",
            PayoutField::Currency => "currency",
            PayoutField::RecipientName => "recipient_name",
            PayoutField::RecipientAccount => "recipient_account",
            PayoutField::RecipientBankCode => "recipient_bank_code",
            PayoutField::Description => "description",
            PayoutField::Status => "status",
            PayoutField::FailureReason => "failure_reason",
            PayoutField::ProcessedAt => "processed_at",
        }
    }
}

/// Stored payout record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub id: PayoutId,
    pub amount: Decimal,
    pub currency: Currency,
    pub recipient_name: String,
    pub recipient_account: String,
    pub recipient_bank_code: Option<String>,
    pub status: PayoutStatus,
    pub description: Option<String>,
    pub failure_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payout {
    /// Build a fresh PENDING record from validated input
    pub fn new(input: NewPayout, now: DateTime<Utc>) -> Self {
        let mut amount = input.amount;
        amount.rescale(AMOUNT_SCALE);

        Self {
            id: PayoutId::new(),
            amount,
            currency: input.currency,
            recipient_name: input.recipient_name,
            recipient_account: input.recipient_account,
            recipient_bank_code: non_empty(input.recipient_bank_code),
            status: PayoutStatus::Pending,
            description: non_empty(input.description),
            failure_reason: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, applying the transition's side effect.
    ///
    /// Returns the fields that changed.
    pub fn enter(
        &mut self,
        next: PayoutStatus,
        effect: Option<Effect>,
        now: DateTime<Utc>,
    ) -> Vec<PayoutField> {
        let mut changed = Vec::with_capacity(2);
        if self.status != next {
            self.status = next;
            changed.push(PayoutField::Status);
        }

        match effect {
            Some(Effect::StampProcessedAt) => {
                self.processed_at = Some(now);
                changed.push(PayoutField::ProcessedAt);
            }
            Some(Effect::RecordFailure(reason)) => {
                self.failure_reason = Some(reason);
                changed.push(PayoutField::FailureReason);
            }
            None => {}
        }

        self.updated_at = now;
        changed
    }

    /// Copy `fields` (and `updated_at`) from `source` into `self`
    pub fn copy_fields(&mut self, source: &Payout, fields: &[PayoutField]) {
        for field in fields {
            match field {
                PayoutField::Amount => self.amount = source.amount,
                PayoutField::Currency => self.currency = source.currency,
                PayoutField::RecipientName => {
                    self.recipient_name = source.recipient_name.clone()
                }
                PayoutField::RecipientAccount => {
                    self.recipient_account = source.recipient_account.clone()
                }
                PayoutField::RecipientBankCode => {
                    self.recipient_bank_code = source.recipient_bank_code.clone()
                }
                PayoutField::Description => self.description = source.description.clone(),
                PayoutField::Status => self.status = source.status,
                PayoutField::FailureReason => {
                    self.failure_reason = source.failure_reason.clone()
                }
                PayoutField::ProcessedAt => self.processed_at = source.processed_at,
            }
        }
        self.updated_at = source.updated_at;
    }
}

/// Creation input. Carries no status or outcome fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewPayout {
    #[validate(custom(function = "validate_amount"))]
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[validate(custom(function = "validate_recipient_name"))]
    pub recipient_name: String,
    #[validate(length(min = 8, max = 34))]
    pub recipient_account: String,
    #[serde(default)]
    #[validate(length(max = 11))]
    pub recipient_bank_code: Option<String>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

impl NewPayout {
    pub fn new(
        amount: Decimal,
        currency: Currency,
        recipient_name: impl Into<String>,
        recipient_account: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            currency,
            recipient_name: recipient_name.into(),
            recipient_account: recipient_account.into(),
            recipient_bank_code: None,
            description: None,
        }
    }

    pub fn with_bank_code(mut self, bank_code: impl Into<String>) -> Self {
        self.recipient_bank_code = Some(bank_code.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of a PENDING payout.
///
/// An empty `recipient_bank_code` or `description` clears the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PayoutUpdate {
    #[validate(custom(function = "validate_amount"))]
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
    #[validate(custom(function = "validate_recipient_name"))]
    pub recipient_name: Option<String>,
    #[validate(length(min = 8, max = 34))]
    pub recipient_account: Option<String>,
    #[validate(length(max = 11))]
    pub recipient_bank_code: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

impl PayoutUpdate {
    /// Write the supplied fields into `payout`, returning which ones were set
    pub fn apply_to(self, payout: &mut Payout) -> Vec<PayoutField> {
        let mut changed = Vec::new();

        if let Some(mut amount) = self.amount {
            amount.rescale(AMOUNT_SCALE);
            payout.amount = amount;
            changed.push(PayoutField::Amount);
        }
        if let Some(currency) = self.currency {
            payout.currency = currency;
            changed.push(PayoutField::Currency);
        }
        if let Some(name) = self.recipient_name {
            payout.recipient_name = name;
            changed.push(PayoutField::RecipientName);
        }
        if let Some(account) = self.recipient_account {
            payout.recipient_account = account;
            changed.push(PayoutField::RecipientAccount);
        }
        if self.recipient_bank_code.is_some() {
            payout.recipient_bank_code = non_empty(self.recipient_bank_code);
            changed.push(PayoutField::RecipientBankCode);
        }
        if self.description.is_some() {
            payout.description = non_empty(self.description);
            changed.push(PayoutField::Description);
        }

        changed
    }
}

/// List filter; all bounds inclusive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayoutFilter {
    pub status: Option<PayoutStatus>,
    pub currency: Option<Currency>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl PayoutFilter {
    pub fn with_status(mut self, status: PayoutStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, payout: &Payout) -> bool {
        self.status.is_none_or(|s| payout.status == s)
            && self.currency.is_none_or(|c| payout.currency == c)
            && self.min_amount.is_none_or(|min| payout.amount >= min)
            && self.max_amount.is_none_or(|max| payout.amount <= max)
    }
}

fn validate_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount_not_positive")
            .with_message("Amount must be positive.".into()));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(ValidationError::new("amount_precision")
            .with_message("Amount must have at most 2 decimal places.".into()));
    }
    // NUMERIC(18, 2) leaves 16 integer digits
    if *amount >= Decimal::from(10_000_000_000_000_000_i64) {
        return Err(ValidationError::new("amount_too_large")
            .with_message("Amount has too many digits.".into()));
    }
    Ok(())
}

/// Length is counted after trimming, so blank names are rejected
fn validate_recipient_name(name: &str) -> Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if !(2..=255).contains(&len) {
        return Err(ValidationError::new("recipient_name_length")
            .with_message("Recipient name must be 2 to 255 characters.".into()));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
