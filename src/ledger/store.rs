//! Ledger Store Trait
//!
//! The only component that mutates balances. Every method is atomic: either
//! all of its writes become visible or none do. Balance read-modify-write is
//! serialized per account, and operations touching two accounts lock them in
//! ascending [`AccountId`] order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{
    Account, AccountId, AccountStatus, NewPaymentDetails, NewTransaction, PaymentDetails,
    Transaction, TransactionId, TransactionType, TransferEntry, TransferPair, WebhookEvent,
};
use crate::error::WalletError;
use crate::payment::{StatusUpdate, TransactionStatus, TransitionOutcome};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // === Accounts ===

    /// Create an ACTIVE account with zero balance
    async fn create_account(&self, account_id: AccountId) -> Result<Account, WalletError>;

    async fn get_account(&self, account_id: AccountId) -> Result<Account, WalletError>;

    async fn set_account_status(
        &self,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<Account, WalletError>;

    // === Primitive balance operations ===

    /// Credit an ACTIVE account. Fails on `u64` overflow.
    async fn apply_credit(&self, account_id: AccountId, amount: u64) -> Result<Account, WalletError>;

    /// Debit an ACTIVE account. Fails `InsufficientBalance` when the
    /// balance would go negative; the check and the write are one step.
    async fn apply_debit(&self, account_id: AccountId, amount: u64) -> Result<Account, WalletError>;

    // === Transactions ===

    /// Insert a PENDING transaction.
    ///
    /// # Errors
    /// * `InvalidRequest` - the type holds funds; those open through
    ///   [`open_payment`](Self::open_payment)
    /// * `InvalidAmount` - amount is zero
    /// * `NotFound` - unknown account
    /// * `DuplicateReference` - `(account, kind, external_reference_id)` exists;
    ///   the error carries the existing transaction id
    async fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, WalletError>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, WalletError>;

    async fn find_by_reference(
        &self,
        account_id: AccountId,
        kind: TransactionType,
        external_reference_id: &str,
    ) -> Result<Option<Transaction>, WalletError>;

    async fn find_by_provider_payment(
        &self,
        provider: &str,
        provider_payment_id: &str,
    ) -> Result<Option<Transaction>, WalletError>;

    async fn get_payment_details(
        &self,
        id: TransactionId,
    ) -> Result<Option<PaymentDetails>, WalletError>;

    /// PENDING transactions of `kind` last updated at or before `older_than`, oldest first
    async fn list_pending(
        &self,
        kind: TransactionType,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, WalletError>;

    /// Claim up to `limit` PENDING transactions of `kind` for a status poll
    /// and stamp them as polled now.
    ///
    /// A transaction is due when last updated at or before `older_than` and
    /// not polled since then. Never-polled transactions come first, then the
    /// least recently polled, so a backlog larger than `limit` rotates.
    async fn claim_for_poll(
        &self,
        kind: TransactionType,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, WalletError>;

    /// Set a status without any balance effect.
    ///
    /// No-op when already in `status`; `InvalidTransition` when terminal with
    /// a different status. Provider-settled transactions go through
    /// [`commit_transition`](Self::commit_transition) instead.
    async fn finalize_transaction(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction, WalletError>;

    // === Composite operations ===

    /// Create a PENDING transaction with its payment details. For types that
    /// hold funds the amount is debited in the same step.
    async fn open_payment(
        &self,
        new: NewTransaction,
        details: NewPaymentDetails,
    ) -> Result<Transaction, WalletError>;

    /// Record the provider's id for an opened payment
    async fn attach_provider_payment(
        &self,
        id: TransactionId,
        provider_payment_id: &str,
    ) -> Result<(), WalletError>;

    /// Debit source, credit destination and record both COMPLETED legs
    async fn commit_transfer(&self, entry: &TransferEntry) -> Result<TransferPair, WalletError>;

    /// Credit the account and record a COMPLETED transaction
    async fn commit_settled(&self, new: NewTransaction) -> Result<Transaction, WalletError>;

    /// Apply a status update with its payment-details write and balance effect.
    /// `InvalidRequest` when the update reports a provider id other than the
    /// one already attached.
    async fn commit_transition(&self, update: &StatusUpdate)
    -> Result<TransitionOutcome, WalletError>;

    // === Audit ===

    async fn record_webhook_event(&self, event: &WebhookEvent) -> Result<(), WalletError>;
}
