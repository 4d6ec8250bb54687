use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::FundingConfig;
use crate::error::WalletError;
use crate::funding::service::positive_amount;
use crate::ledger::{
    LedgerStore, NewPaymentDetails, NewTransaction, Transaction, TransactionId, TransactionType,
};
use crate::money;
use crate::payment::{PaymentStateMachine, StatusUpdate, StatusVocabulary, TransactionStatus};
use crate::provider::{
    DisbursementRequest, PAYOUT_PROVIDER, PayoutProvider, ProviderError, with_timeout,
};
use crate::requests::WithdrawalRequest;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalReceipt {
    pub transaction: Transaction,
    /// None while the submission outcome is unknown
    pub provider_payment_id: Option<String>,
    pub replayed: bool,
}

pub struct WithdrawalCoordinator {
    store: Arc<dyn LedgerStore>,
    payout: Arc<dyn PayoutProvider>,
    machine: PaymentStateMachine,
    config: FundingConfig,
    provider_timeout: Duration,
}

impl WithdrawalCoordinator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        payout: Arc<dyn PayoutProvider>,
        machine: PaymentStateMachine,
        config: FundingConfig,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            store,
            payout,
            machine,
            config,
            provider_timeout,
        }
    }

    /// Validate the destination, hold the amount and submit the disbursement.
    ///
    /// # Errors
    /// * `InvalidAmount` / `InvalidRequest` - malformed request, nothing written
    /// * `InvalidBankAccount` - provider rejected the destination, nothing written
    /// * `InsufficientBalance` - nothing written
    /// * `Provider` - disbursement explicitly rejected; the withdrawal is FAILED
    ///   and the hold released
    pub async fn initiate_withdrawal(
        &self,
        req: &WithdrawalRequest,
    ) -> Result<WithdrawalReceipt, WalletError> {
        req.validate()?;
        let amount = positive_amount(&req.amount_gsalt)?;
        if !req.account_number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WalletError::InvalidBankAccount(
                "account number must be numeric".into(),
            ));
        }

        if let Some(existing) = self
            .store
            .find_by_reference(req.account_id, TransactionType::Withdrawal, &req.external_reference_id)
            .await?
        {
            return self.replay(existing).await;
        }

        // 1. Destination check, outside any ledger lock
        let info = match with_timeout(
            self.provider_timeout,
            self.payout
                .validate_bank_account(&req.bank_code, &req.account_number),
        )
        .await
        {
            Ok(info) => info,
            Err(e) if e.is_explicit_rejection() => {
                return Err(WalletError::InvalidBankAccount(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !holder_matches(&info.account_holder, &req.recipient_name) {
            return Err(WalletError::InvalidBankAccount(
                "recipient name does not match account holder".into(),
            ));
        }

        // 2-3. Hold the amount and record the PENDING withdrawal in one step
        let payment_amount = money::to_major(amount) * self.config.payment_rate;
        let details = NewPaymentDetails {
            provider: PAYOUT_PROVIDER.to_string(),
            payment_amount,
            payment_currency: self.config.payment_currency.clone(),
            payment_method: Some("BANK_TRANSFER".to_string()),
            metadata: Some(serde_json::json!({
                "bank_code": req.bank_code,
                "account_number": req.account_number,
                "recipient_name": req.recipient_name,
                "account_holder": info.account_holder,
            })),
        };
        let new = NewTransaction::new(req.account_id, TransactionType::Withdrawal, amount)
            .with_reference(req.external_reference_id.clone())
            .with_description(req.description.clone());

        let tx = match self.store.open_payment(new, details).await {
            Ok(tx) => tx,
            Err(WalletError::DuplicateReference { existing }) => {
                let existing = self.store.get_transaction(existing).await?;
                return self.replay(existing).await;
            }
            Err(e) => return Err(e),
        };
        info!(
            tx_id = %tx.id,
            account_id = %tx.account_id,
            amount = tx.amount,
            bank_code = %req.bank_code,
            "Withdrawal funds held"
        );

        // 4. Submit, still outside any ledger lock
        let disbursement = DisbursementRequest {
            reference: tx.id,
            amount: payment_amount,
            currency: self.config.payment_currency.clone(),
            bank_code: req.bank_code.clone(),
            account_number: req.account_number.clone(),
            recipient_name: req.recipient_name.clone(),
            description: req.description.clone(),
        };

        match with_timeout(
            self.provider_timeout,
            self.payout.submit_disbursement(&disbursement),
        )
        .await
        {
            Ok(submitted) => {
                self.store
                    .attach_provider_payment(tx.id, &submitted.provider_payment_id)
                    .await?;
                info!(
                    tx_id = %tx.id,
                    provider_payment_id = %submitted.provider_payment_id,
                    provider_status = %submitted.status,
                    "Disbursement submitted"
                );
                Ok(WithdrawalReceipt {
                    transaction: tx,
                    provider_payment_id: Some(submitted.provider_payment_id),
                    replayed: false,
                })
            }
            Err(e) if e.is_explicit_rejection() => {
                warn!(tx_id = %tx.id, error = %e, "Disbursement rejected, releasing hold");
                self.machine
                    .apply_status_update(
                        StatusUpdate::new(tx.id, TransactionStatus::Failed)
                            .with_provider_status("REJECTED")
                            .with_description(Some(e.to_string())),
                    )
                    .await?;
                Err(e.into())
            }
            Err(e) => {
                warn!(
                    tx_id = %tx.id,
                    error = %e,
                    "Disbursement outcome unknown, withdrawal stays pending"
                );
                Ok(WithdrawalReceipt {
                    transaction: tx,
                    provider_payment_id: None,
                    replayed: false,
                })
            }
        }
    }

    /// Ask the provider where a PENDING withdrawal stands and reconcile it
    /// through the state machine. Terminal withdrawals are returned as is.
    pub async fn check_withdrawal_status(
        &self,
        id: TransactionId,
    ) -> Result<Transaction, WalletError> {
        let tx = self.store.get_transaction(id).await?;
        if tx.kind != TransactionType::Withdrawal {
            return Err(WalletError::NotFound(format!("withdrawal {}", id)));
        }
        if tx.status.is_terminal() {
            return Ok(tx);
        }

        let remote = match with_timeout(self.provider_timeout, self.payout.disbursement_status(id)).await {
            Ok(remote) => remote,
            Err(ProviderError::NotFound(_)) => {
                warn!(tx_id = %id, "Provider has no disbursement for pending withdrawal");
                return Ok(tx);
            }
            Err(e) => return Err(e.into()),
        };

        let status = StatusVocabulary::Disbursement.map(&remote.status)?;
        debug!(
            tx_id = %id,
            provider_status = %remote.status,
            status = %status,
            "Polled disbursement status"
        );

        let update = StatusUpdate::new(id, status)
            .with_provider_status(remote.status)
            .with_provider_payment_id(Some(remote.provider_payment_id))
            .with_description(remote.failure_reason)
            .with_payment_time(remote.updated_at);
        let outcome = self.machine.apply_status_update(update).await?;
        Ok(outcome.into_transaction())
    }

    async fn replay(&self, existing: Transaction) -> Result<WithdrawalReceipt, WalletError> {
        info!(
            tx_id = %existing.id,
            status = %existing.status,
            "Withdrawal with reference already exists - returning existing record (idempotent)"
        );
        let details = self.store.get_payment_details(existing.id).await?;
        Ok(WithdrawalReceipt {
            transaction: existing,
            provider_payment_id: details.and_then(|d| d.provider_payment_id),
            replayed: true,
        })
    }
}

/// Case- and whitespace-insensitive name comparison. An empty holder name
/// means the provider does not disclose it.
fn holder_matches(account_holder: &str, recipient_name: &str) -> bool {
    fn normalize(name: &str) -> String {
        name.split_whitespace()
            .map(|part| part.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }
    account_holder.trim().is_empty() || normalize(account_holder) == normalize(recipient_name)
}
