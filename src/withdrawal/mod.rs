//! Withdrawal / Payout Coordinator
//!
//! Sends GSALT out of the wallet to a bank account through the payout
//! provider.
//!
//! # Flow
//!
//! ```text
//! validate destination ──► hold (debit) + PENDING ──► submit disbursement
//!                                    │                       │
//!                                    │        rejected ──► FAILED (refund)
//!                                    │        timeout  ──► stays PENDING
//!                                    ▼
//!                     webhook / status poll ──► COMPLETED | FAILED | CANCELLED
//! ```
//!
//! Funds are only released on an explicit provider rejection or a reported
//! FAILED/CANCELLED status, never on a timeout.

pub mod coordinator;

pub use coordinator::{WithdrawalCoordinator, WithdrawalReceipt};
