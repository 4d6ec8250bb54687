//! Wallet Error Types
//!
//! One error taxonomy for the ledger, the payment lifecycle and the
//! provider-facing coordinators. Error codes are stable strings used in
//! API responses and in the webhook event log.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::ledger::types::{AccountId, TransactionId};
use crate::money::MoneyError;
use crate::payment::TransactionStatus;

/// Wallet error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    // === Validation Errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Source and destination account cannot be the same")]
    SameAccount,

    #[error("Invalid bank account: {0}")]
    InvalidBankAccount(String),

    // === Balance Errors ===
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u64, requested: u64 },

    #[error("Account {0} is not active")]
    AccountNotActive(AccountId),

    // === Idempotency Errors ===
    #[error("Duplicate reference (existing transaction {existing})")]
    DuplicateReference { existing: TransactionId },

    // === Lifecycle Errors ===
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Unsupported provider status: {0}")]
    UnsupportedProviderStatus(String),

    #[error("Amount mismatch: expected {expected}, provider reported {reported}")]
    AmountMismatch { expected: Decimal, reported: Decimal },

    #[error("Not found: {0}")]
    NotFound(String),

    // === System Errors ===
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidAmount(_) => "INVALID_AMOUNT",
            WalletError::InvalidRequest(_) => "INVALID_REQUEST",
            WalletError::SameAccount => "SAME_ACCOUNT",
            WalletError::InvalidBankAccount(_) => "INVALID_BANK_ACCOUNT",
            WalletError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            WalletError::AccountNotActive(_) => "ACCOUNT_NOT_ACTIVE",
            WalletError::DuplicateReference { .. } => "DUPLICATE_REFERENCE",
            WalletError::InvalidTransition { .. } => "INVALID_TRANSITION",
            WalletError::UnsupportedProviderStatus(_) => "UNSUPPORTED_PROVIDER_STATUS",
            WalletError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            WalletError::NotFound(_) => "NOT_FOUND",
            WalletError::Provider(_) => "PROVIDER_ERROR",
            WalletError::DatabaseError(_) => "DATABASE_ERROR",
            WalletError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        match self {
            WalletError::InvalidAmount(_)
            | WalletError::InvalidRequest(_)
            | WalletError::SameAccount
            | WalletError::InvalidBankAccount(_)
            | WalletError::InsufficientBalance { .. }
            | WalletError::UnsupportedProviderStatus(_)
            | WalletError::AmountMismatch { .. } => 400,

            WalletError::AccountNotActive(_) => 403,

            WalletError::NotFound(_) => 404,

            WalletError::DuplicateReference { .. } | WalletError::InvalidTransition { .. } => 409,

            WalletError::Provider(_) => 502,

            WalletError::DatabaseError(_) | WalletError::Internal(_) => 500,
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::Provider(_) | WalletError::DatabaseError(_)
        )
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::DatabaseError(e.to_string())
    }
}

impl From<MoneyError> for WalletError {
    fn from(e: MoneyError) -> Self {
        WalletError::InvalidAmount(e.to_string())
    }
}

impl From<validator::ValidationErrors> for WalletError {
    fn from(e: validator::ValidationErrors) -> Self {
        WalletError::InvalidRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(WalletError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(
            WalletError::InsufficientBalance {
                available: 10,
                requested: 20
            }
            .code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(
            WalletError::DuplicateReference {
                existing: TransactionId::new()
            }
            .code(),
            "DUPLICATE_REFERENCE"
        );
        assert_eq!(
            WalletError::UnsupportedProviderStatus("REVERSED".into()).code(),
            "UNSUPPORTED_PROVIDER_STATUS"
        );
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(WalletError::InvalidAmount("0".into()).http_status(), 400);
        assert_eq!(WalletError::NotFound("tx".into()).http_status(), 404);
        assert_eq!(
            WalletError::InvalidTransition {
                from: TransactionStatus::Completed,
                to: TransactionStatus::Failed
            }
            .http_status(),
            409
        );
        assert_eq!(WalletError::Provider("timeout".into()).http_status(), 502);
        assert_eq!(WalletError::DatabaseError("down".into()).http_status(), 500);
    }

    #[test]
    fn test_retryable() {
        assert!(WalletError::Provider("timeout".into()).is_retryable());
        assert!(WalletError::DatabaseError("down".into()).is_retryable());
        assert!(!WalletError::SameAccount.is_retryable());
    }

    #[test]
    fn test_money_error_maps_to_invalid_amount() {
        let err: WalletError = MoneyError::Negative.into();
        assert_eq!(err.code(), "INVALID_AMOUNT");
    }
}
