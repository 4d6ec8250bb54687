//! Payment State Machine
//!
//! Single entry point for moving TOPUP, PAYMENT and WITHDRAWAL transactions
//! out of PENDING. Webhooks, status polls, provider rejections and expiry all
//! funnel through [`PaymentStateMachine::apply_status_update`], so the
//! balance effect of a terminal status is applied exactly once.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::state::{StatusUpdate, TransitionOutcome};
use crate::error::WalletError;
use crate::ledger::LedgerStore;

#[derive(Clone)]
pub struct PaymentStateMachine {
    store: Arc<dyn LedgerStore>,
}

impl PaymentStateMachine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Apply a status report.
    ///
    /// * PENDING to terminal: status, payment details and balance effect in one step
    /// * same terminal status again: `Replayed`, no side effects
    /// * any other status for a terminal transaction: `InvalidTransition`,
    ///   nothing mutated
    pub async fn apply_status_update(
        &self,
        update: StatusUpdate,
    ) -> Result<TransitionOutcome, WalletError> {
        let outcome = match self.store.commit_transition(&update).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    tx_id = %update.transaction_id,
                    status = %update.status,
                    error = %e,
                    "Status update rejected"
                );
                return Err(e);
            }
        };

        match &outcome {
            TransitionOutcome::Applied(tx) => info!(
                tx_id = %tx.id,
                account_id = %tx.account_id,
                kind = %tx.kind,
                status = %tx.status,
                amount = tx.amount,
                provider_status = %update.provider_status,
                "Transaction finalized"
            ),
            TransitionOutcome::Replayed(tx) => debug!(
                tx_id = %tx.id,
                status = %tx.status,
                "Status update replayed, no effect"
            ),
        }

        Ok(outcome)
    }
}
