//! Payment Lifecycle
//!
//! Status vocabulary, transition rules and the state machine that applies
//! provider-reported outcomes to the ledger.

pub mod machine;
pub mod state;
pub mod vocabulary;

pub use machine::PaymentStateMachine;
pub use state::{
    BalanceEffect, StatusUpdate, TransactionStatus, TransitionCheck, TransitionOutcome,
};
pub use vocabulary::StatusVocabulary;
