//! GSALT Wallet Ledger
//!
//! Transaction and payment reconciliation core for a custodial GSALT wallet.
//! Balances are integer minor units (1 GSALT = 100 units). Money moves through
//! an append-only transaction ledger; provider-backed transactions settle
//! through one status state machine, whether the news arrives by webhook or
//! by the worker's status poll.
//!
//! # Modules
//!
//! - [`money`] - GSALT amount codec
//! - [`ledger`] - Accounts, transactions and the store seam (memory, PostgreSQL)
//! - [`payment`] - Status state machine and provider status vocabularies
//! - [`transfer`] - Account-to-account transfers
//! - [`funding`] - Top-ups, payments and voucher redemptions
//! - [`withdrawal`] - Bank payouts
//! - [`webhook`] - Provider callback reconciliation
//! - [`worker`] - Stale withdrawal polling and charge expiry
//! - [`wallet`] - Service wiring

pub mod config;
pub mod db;
pub mod error;
pub mod funding;
pub mod ledger;
pub mod logging;
pub mod money;
pub mod payment;
pub mod provider;
pub mod requests;
pub mod transfer;
pub mod wallet;
pub mod webhook;
pub mod withdrawal;
pub mod worker;


// Convenient re-exports at crate root
pub use error::WalletError;
pub use ledger::{
    Account, AccountId, AccountStatus, LedgerStore, MemoryLedgerStore, PgLedgerStore,
    Transaction, TransactionId, TransactionType,
};
pub use payment::{PaymentStateMachine, StatusUpdate, TransactionStatus, TransitionOutcome};
pub use wallet::Wallet;
pub use webhook::{Acknowledgement, WebhookPayload};
pub use worker::{ReconciliationWorker, WorkerConfig};
