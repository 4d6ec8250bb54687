//! Payment Lifecycle States
//!
//! ```text
//! PENDING ──► COMPLETED
//!    │
//!    ├──────► FAILED
//!    ├──────► EXPIRED
//!    └──────► CANCELLED
//! ```
//!
//! Every state except PENDING is terminal. A terminal transaction never
//! changes status again; repeating the same terminal status is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WalletError;
use crate::ledger::types::{Transaction, TransactionId, TransactionType};

/// Transaction status
///
/// State IDs are stored as SMALLINT. Negative IDs are failure terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TransactionStatus {
    Pending = 0,
    Completed = 10,
    Failed = -10,
    Expired = -20,
    Cancelled = -30,
}

impl TransactionStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Terminal states in which the economic effect did not happen
    #[inline]
    pub fn is_unsuccessful(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Failed | TransactionStatus::Expired | TransactionStatus::Cancelled
        )
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransactionStatus::Pending),
            10 => Some(TransactionStatus::Completed),
            -10 => Some(TransactionStatus::Failed),
            -20 => Some(TransactionStatus::Expired),
            -30 => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Expired => "EXPIRED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    /// Decide what a status report means for a transaction currently in `self`.
    pub fn check_transition(self, next: TransactionStatus) -> Result<TransitionCheck, WalletError> {
        match (self, next) {
            (TransactionStatus::Pending, TransactionStatus::Pending) => Ok(TransitionCheck::Replay),
            (TransactionStatus::Pending, _) => Ok(TransitionCheck::Apply),
            (current, next) if current == next => Ok(TransitionCheck::Replay),
            (current, next) => Err(WalletError::InvalidTransition {
                from: current,
                to: next,
            }),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "EXPIRED" => Ok(TransactionStatus::Expired),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            other => Err(WalletError::UnsupportedProviderStatus(other.to_string())),
        }
    }
}

impl TryFrom<i16> for TransactionStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransactionStatus::from_id(value).ok_or(())
    }
}

/// Result of [`TransactionStatus::check_transition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// PENDING to terminal: write the status and its balance effect
    Apply,
    /// Same status again: succeed without side effects
    Replay,
}

/// Balance change that accompanies a status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEffect {
    None,
    /// Credit the transaction's account (top-up settlement or hold release)
    Credit(u64),
}

impl BalanceEffect {
    /// Balance effect of moving a PENDING transaction of `kind` to `next`.
    ///
    /// Completed top-ups credit the account. Payments and withdrawals were
    /// debited when opened, so every unsuccessful terminal releases the hold.
    pub fn for_transition(kind: TransactionType, amount: u64, next: TransactionStatus) -> Self {
        match (kind, next) {
            (TransactionType::Topup, TransactionStatus::Completed) => BalanceEffect::Credit(amount),
            (kind, next) if kind.holds_funds() && next.is_unsuccessful() => {
                BalanceEffect::Credit(amount)
            }
            _ => BalanceEffect::None,
        }
    }
}

/// A status report for one transaction, already mapped to the internal vocabulary
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    /// Raw provider status, recorded on the payment details
    pub provider_status: String,
    pub provider_payment_id: Option<String>,
    pub status_description: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn new(transaction_id: TransactionId, status: TransactionStatus) -> Self {
        Self {
            transaction_id,
            status,
            provider_status: status.as_str().to_string(),
            provider_payment_id: None,
            status_description: None,
            payment_time: None,
        }
    }

    pub fn with_provider_status(mut self, provider_status: impl Into<String>) -> Self {
        self.provider_status = provider_status.into();
        self
    }

    pub fn with_provider_payment_id(mut self, id: Option<String>) -> Self {
        self.provider_payment_id = id;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.status_description = description;
        self
    }

    pub fn with_payment_time(mut self, payment_time: Option<DateTime<Utc>>) -> Self {
        self.payment_time = payment_time;
        self
    }
}

/// What a committed status update did
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(Transaction),
    Replayed(Transaction),
}

impl TransitionOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            TransitionOutcome::Applied(tx) | TransitionOutcome::Replayed(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            TransitionOutcome::Applied(tx) | TransitionOutcome::Replayed(tx) => tx,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}
