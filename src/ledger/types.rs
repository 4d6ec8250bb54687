//! Ledger Core Types
//!
//! Accounts, transactions and payment details as persisted by the
//! [`LedgerStore`](super::LedgerStore). Amounts are always minor units.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::payment::TransactionStatus;

/// Account identifier (UUID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(uuid::Uuid);

impl AccountId {
    /// Generate a new random AccountId
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

/// Transaction identifier - ULID-based, sortable by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(ulid::Ulid);

impl TransactionId {
    /// Generate a new unique TransactionId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Links the two legs of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(ulid::Ulid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

// ============================================================================
// Account
// ============================================================================

/// Account status
///
/// IDs are stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum AccountStatus {
    Active = 1,
    Inactive = 2,
    Suspended = 3,
}

impl AccountStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(AccountStatus::Active),
            2 => Some(AccountStatus::Inactive),
            3 => Some(AccountStatus::Suspended),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
            AccountStatus::Suspended => "SUSPENDED",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wallet account. `balance` is in minor units and never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: u64,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// Transaction type
///
/// IDs are stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TransactionType {
    Topup = 1,
    TransferIn = 2,
    TransferOut = 3,
    Payment = 4,
    Withdrawal = 5,
    VoucherRedemption = 6,
}

impl TransactionType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(TransactionType::Topup),
            2 => Some(TransactionType::TransferIn),
            3 => Some(TransactionType::TransferOut),
            4 => Some(TransactionType::Payment),
            5 => Some(TransactionType::Withdrawal),
            6 => Some(TransactionType::VoucherRedemption),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Topup => "TOPUP",
            TransactionType::TransferIn => "TRANSFER_IN",
            TransactionType::TransferOut => "TRANSFER_OUT",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::VoucherRedemption => "VOUCHER_REDEMPTION",
        }
    }

    /// Types that carry a [`PaymentDetails`] record and settle asynchronously
    pub fn has_payment_details(&self) -> bool {
        matches!(
            self,
            TransactionType::Topup | TransactionType::Payment | TransactionType::Withdrawal
        )
    }

    /// Types whose amount is debited when the transaction opens and
    /// released if it fails
    pub fn holds_funds(&self) -> bool {
        matches!(self, TransactionType::Payment | TransactionType::Withdrawal)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TransactionType {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransactionType::from_id(value).ok_or(())
    }
}

/// A balance-affecting event on one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionType,
    /// Minor units; direction is implied by `kind`
    pub amount: u64,
    pub status: TransactionStatus,
    /// Client idempotency key, unique per (account, kind)
    pub external_reference_id: Option<String>,
    pub correlation_id: Option<CorrelationId>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub kind: TransactionType,
    pub amount: u64,
    pub external_reference_id: Option<String>,
    pub description: Option<String>,
}

impl NewTransaction {
    pub fn new(account_id: AccountId, kind: TransactionType, amount: u64) -> Self {
        Self {
            account_id,
            kind,
            amount,
            external_reference_id: None,
            description: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.external_reference_id = Some(reference.into());
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

// ============================================================================
// Payment details
// ============================================================================

/// Provider-side record of a TOPUP, PAYMENT or WITHDRAWAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub transaction_id: TransactionId,
    pub provider: String,
    pub provider_payment_id: Option<String>,
    pub payment_amount: Decimal,
    pub payment_currency: String,
    pub payment_method: Option<String>,
    /// Raw provider status vocabulary
    pub status: String,
    pub status_description: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating payment details alongside a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentDetails {
    pub provider: String,
    pub payment_amount: Decimal,
    pub payment_currency: String,
    pub payment_method: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Initial provider status of freshly opened payment details
pub const PROVIDER_STATUS_PENDING: &str = "PENDING";

// ============================================================================
// Transfers
// ============================================================================

/// A validated transfer ready to be committed
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEntry {
    pub correlation_id: CorrelationId,
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: u64,
    pub description: Option<String>,
}

/// Both legs of a committed transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPair {
    pub correlation_id: CorrelationId,
    pub outgoing: Transaction,
    pub incoming: Transaction,
}

// ============================================================================
// Webhook audit log
// ============================================================================

/// Outcome of processing one webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookOutcome {
    /// The delivery changed the transaction's status
    Applied,
    /// Same terminal status seen before
    Duplicate,
    /// Late non-terminal report for an already terminal transaction
    Stale,
    /// The delivery could not be applied; see the error code
    Rejected,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied => "APPLIED",
            WebhookOutcome::Duplicate => "DUPLICATE",
            WebhookOutcome::Stale => "STALE",
            WebhookOutcome::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for WebhookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit row for a webhook delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub provider: String,
    pub transaction_reference: String,
    pub provider_payment_id: Option<String>,
    pub provider_status: String,
    pub transaction_id: Option<TransactionId>,
    pub outcome: WebhookOutcome,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub received_at: DateTime<Utc>,
}
