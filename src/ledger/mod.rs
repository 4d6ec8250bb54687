//! Ledger Store
//!
//! Accounts, transactions and payment details, and the only code allowed to
//! change a balance.
//!
//! # Invariants
//!
//! 1. **Non-negative**: no committed state has a negative balance
//! 2. **Atomic composites**: a transfer pair, a hold plus its PENDING
//!    transaction, and a status plus its balance effect are each all-or-nothing
//! 3. **Idempotency**: `(account, type, external_reference_id)` and
//!    `(provider, provider_payment_id)` are unique

pub mod memory;
pub mod postgres;
pub mod store;
pub mod types;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use store::LedgerStore;
pub use types::{
    Account, AccountId, AccountStatus, CorrelationId, NewPaymentDetails, NewTransaction,
    PaymentDetails, Transaction, TransactionId, TransactionType, TransferEntry, TransferPair,
    WebhookEvent, WebhookOutcome,
};
