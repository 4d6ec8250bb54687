//! Provider Boundary
//!
//! Outbound collaborators: the payment gateway that issues charges for
//! top-ups and payments, and the payout provider that validates bank
//! accounts and sends disbursements. The core only sees these traits.
//!
//! # Explicit Fail Rule
//!
//! Only [`ProviderError::Rejected`] means the provider definitely did not
//! act. Timeouts and transport errors leave the outcome unknown, so callers
//! must not release funds on them.

pub mod http;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::WalletError;
use crate::ledger::TransactionId;

pub use http::{HttpPaymentGateway, HttpPayoutProvider};

/// Provider key recorded on payment details for gateway charges
pub const PAYMENT_GATEWAY: &str = "payment_gateway";

/// Provider key recorded on payment details for payouts
pub const PAYOUT_PROVIDER: &str = "payout_provider";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Rejected by provider: {0}")]
    Rejected(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("Not found at provider: {0}")]
    NotFound(String),
}

impl ProviderError {
    /// The provider definitely refused; safe to release funds
    pub fn is_explicit_rejection(&self) -> bool {
        matches!(self, ProviderError::Rejected(_))
    }
}

impl From<ProviderError> for WalletError {
    fn from(e: ProviderError) -> Self {
        WalletError::Provider(e.to_string())
    }
}

/// Run a provider call under a deadline, mapping expiry to [`ProviderError::Timeout`]
pub async fn with_timeout<T>(
    limit: std::time::Duration,
    call: impl std::future::Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ProviderError::Timeout))
}

// ============================================================================
// Payment gateway
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Our transaction id, sent as the provider's external id
    pub reference: TransactionId,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub provider_payment_id: String,
    pub checkout_url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a charge (invoice) the user completes out of band
    async fn create_charge(&self, req: &ChargeRequest) -> Result<Charge, ProviderError>;
}

// ============================================================================
// Payout provider
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccountInfo {
    pub bank_code: String,
    pub account_number: String,
    pub account_holder: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementRequest {
    /// Our transaction id; the provider deduplicates on it
    pub reference: TransactionId,
    pub amount: Decimal,
    pub currency: String,
    pub bank_code: String,
    pub account_number: String,
    pub recipient_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disbursement {
    pub provider_payment_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementStatus {
    pub provider_payment_id: String,
    pub status: String,
    pub failure_reason: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PayoutProvider: Send + Sync {
    /// Look up the holder of a bank account. `Rejected` means the account is invalid.
    async fn validate_bank_account(
        &self,
        bank_code: &str,
        account_number: &str,
    ) -> Result<BankAccountInfo, ProviderError>;

    async fn submit_disbursement(
        &self,
        req: &DisbursementRequest,
    ) -> Result<Disbursement, ProviderError>;

    /// Current status of the disbursement submitted for `reference`
    async fn disbursement_status(
        &self,
        reference: TransactionId,
    ) -> Result<DisbursementStatus, ProviderError>;
}
