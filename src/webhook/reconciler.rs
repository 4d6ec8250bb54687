use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::payload::{NormalizedWebhook, WebhookPayload};
use crate::error::WalletError;
use crate::ledger::{LedgerStore, Transaction, TransactionId, WebhookEvent, WebhookOutcome};
use crate::payment::{PaymentStateMachine, StatusUpdate, TransactionStatus, TransitionOutcome};

/// Returned to the provider for every delivery. Receipt is always
/// acknowledged; processing problems are logged and recorded, not retried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acknowledgement {
    pub received: bool,
    pub outcome: WebhookOutcome,
    pub transaction_id: Option<TransactionId>,
    pub error_code: Option<&'static str>,
}

pub struct WebhookReconciler {
    store: Arc<dyn LedgerStore>,
    machine: PaymentStateMachine,
}

impl WebhookReconciler {
    pub fn new(store: Arc<dyn LedgerStore>, machine: PaymentStateMachine) -> Self {
        Self { store, machine }
    }

    pub async fn reconcile(&self, payload: WebhookPayload) -> Acknowledgement {
        let webhook = payload.normalize();

        let (transaction_id, result) = match self.resolve(&webhook).await {
            Ok(tx) => (Some(tx.id), self.apply(&webhook, &tx).await),
            Err(e) => (None, Err(e)),
        };

        let (outcome, error) = match &result {
            Ok(TransitionOutcome::Applied(_)) => (WebhookOutcome::Applied, None),
            Ok(TransitionOutcome::Replayed(_)) => (WebhookOutcome::Duplicate, None),
            // A late PENDING notice for a settled transaction
            Err(WalletError::InvalidTransition {
                to: TransactionStatus::Pending,
                ..
            }) => (WebhookOutcome::Stale, None),
            Err(e) => (WebhookOutcome::Rejected, Some(e)),
        };

        match error {
            None => info!(
                provider = webhook.provider,
                reference = %webhook.transaction_reference,
                provider_status = %webhook.provider_status,
                outcome = %outcome,
                "Webhook reconciled"
            ),
            Some(e) => warn!(
                provider = webhook.provider,
                reference = %webhook.transaction_reference,
                provider_status = %webhook.provider_status,
                error_code = e.code(),
                error = %e,
                "Webhook could not be applied"
            ),
        }

        let event = WebhookEvent {
            provider: webhook.provider.to_string(),
            transaction_reference: webhook.transaction_reference.clone(),
            provider_payment_id: Some(webhook.provider_payment_id.clone()),
            provider_status: webhook.provider_status.clone(),
            transaction_id,
            outcome,
            error_code: error.map(|e| e.code().to_string()),
            error_message: error.map(|e| e.to_string()),
            received_at: Utc::now(),
        };
        if let Err(e) = self.store.record_webhook_event(&event).await {
            error!(
                reference = %webhook.transaction_reference,
                error = %e,
                "Failed to record webhook event"
            );
        }

        Acknowledgement {
            received: true,
            outcome,
            transaction_id,
            error_code: error.map(|e| e.code()),
        }
    }

    /// Find the transaction by our reference, falling back to the provider's id
    async fn resolve(&self, webhook: &NormalizedWebhook) -> Result<Transaction, WalletError> {
        if let Ok(id) = webhook.transaction_reference.parse::<TransactionId>() {
            match self.store.get_transaction(id).await {
                Ok(tx) => return Ok(tx),
                Err(WalletError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.store
            .find_by_provider_payment(webhook.provider, &webhook.provider_payment_id)
            .await?
            .ok_or_else(|| {
                WalletError::NotFound(format!(
                    "transaction for {} reference {}",
                    webhook.provider, webhook.transaction_reference
                ))
            })
    }

    async fn apply(
        &self,
        webhook: &NormalizedWebhook,
        tx: &Transaction,
    ) -> Result<TransitionOutcome, WalletError> {
        let status = webhook.vocabulary.map(&webhook.provider_status)?;

        let details = self
            .store
            .get_payment_details(tx.id)
            .await?
            .ok_or_else(|| WalletError::NotFound(format!("payment details {}", tx.id)))?;
        if details.provider != webhook.provider {
            return Err(WalletError::NotFound(format!(
                "transaction {} is not a {} payment",
                tx.id, webhook.provider
            )));
        }

        if status == TransactionStatus::Completed {
            if let Some(reported) = webhook.amount {
                if reported != details.payment_amount {
                    return Err(WalletError::AmountMismatch {
                        expected: details.payment_amount,
                        reported,
                    });
                }
            }
        }

        let update = StatusUpdate::new(tx.id, status)
            .with_provider_status(webhook.provider_status.clone())
            .with_provider_payment_id(Some(webhook.provider_payment_id.clone()))
            .with_description(webhook.description.clone())
            .with_payment_time(webhook.timestamp);
        self.machine.apply_status_update(update).await
    }
}
