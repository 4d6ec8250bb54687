use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::error::WalletError;
use crate::ledger::{AccountId, CorrelationId, LedgerStore, TransferEntry, TransferPair};
use crate::money;
use crate::requests::TransferRequest;

pub struct TransferOrchestrator {
    store: Arc<dyn LedgerStore>,
}

impl TransferOrchestrator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Transfer `amount` minor units from `source` to `destination`.
    ///
    /// # Errors
    /// * `InvalidAmount` - amount is zero
    /// * `SameAccount` - source equals destination
    /// * `InsufficientBalance` - nothing is written
    /// * `NotFound` / `AccountNotActive` - either side cannot take part
    pub async fn transfer(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: u64,
        description: Option<String>,
    ) -> Result<TransferPair, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount(
                "amount must be greater than zero".into(),
            ));
        }
        if source == destination {
            return Err(WalletError::SameAccount);
        }

        let entry = TransferEntry {
            correlation_id: CorrelationId::new(),
            source,
            destination,
            amount,
            description,
        };

        match self.store.commit_transfer(&entry).await {
            Ok(pair) => {
                info!(
                    correlation_id = %pair.correlation_id,
                    source = %source,
                    destination = %destination,
                    amount = amount,
                    "Transfer committed"
                );
                Ok(pair)
            }
            Err(e) => {
                warn!(
                    correlation_id = %entry.correlation_id,
                    source = %source,
                    destination = %destination,
                    amount = amount,
                    error = %e,
                    "Transfer rejected"
                );
                Err(e)
            }
        }
    }

    /// Validate a request and run it through [`transfer`](Self::transfer)
    pub async fn transfer_request(&self, req: &TransferRequest) -> Result<TransferPair, WalletError> {
        req.validate()?;
        let amount = money::to_minor_units(&req.amount_gsalt)?;
        self.transfer(
            req.source_account_id,
            req.destination_account_id,
            amount,
            req.description.clone(),
        )
        .await
    }
}
