//! Transfer Orchestrator
//!
//! Moves GSALT between two wallet accounts. A transfer is one atomic ledger
//! commit: the source debit, the destination credit and both COMPLETED legs
//! become visible together or not at all.

pub mod orchestrator;

pub use orchestrator::TransferOrchestrator;
