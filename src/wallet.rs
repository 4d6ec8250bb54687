//! Service wiring
//!
//! [`Wallet`] builds every service over one shared ledger store and one
//! shared state machine.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, FundingConfig};
use crate::error::WalletError;
use crate::funding::FundingService;
use crate::ledger::{Account, AccountId, LedgerStore, Transaction, TransactionId};
use crate::payment::PaymentStateMachine;
use crate::provider::{PaymentGateway, PayoutProvider};
use crate::transfer::TransferOrchestrator;
use crate::webhook::WebhookReconciler;
use crate::withdrawal::WithdrawalCoordinator;
use crate::worker::{ReconciliationWorker, WorkerConfig};

pub struct Wallet {
    store: Arc<dyn LedgerStore>,
    machine: PaymentStateMachine,
    transfers: TransferOrchestrator,
    funding: FundingService,
    withdrawals: Arc<WithdrawalCoordinator>,
    webhooks: WebhookReconciler,
}

impl Wallet {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        payout: Arc<dyn PayoutProvider>,
        funding: FundingConfig,
        provider_timeout: Duration,
    ) -> Self {
        let machine = PaymentStateMachine::new(store.clone());
        Self {
            transfers: TransferOrchestrator::new(store.clone()),
            funding: FundingService::new(
                store.clone(),
                gateway,
                machine.clone(),
                funding.clone(),
                provider_timeout,
            ),
            withdrawals: Arc::new(WithdrawalCoordinator::new(
                store.clone(),
                payout,
                machine.clone(),
                funding,
                provider_timeout,
            )),
            webhooks: WebhookReconciler::new(store.clone(), machine.clone()),
            machine,
            store,
        }
    }

    pub fn from_config(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        payout: Arc<dyn PayoutProvider>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            store,
            gateway,
            payout,
            config.funding.clone(),
            config.providers.timeout(),
        )
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn machine(&self) -> &PaymentStateMachine {
        &self.machine
    }

    pub fn transfers(&self) -> &TransferOrchestrator {
        &self.transfers
    }

    pub fn funding(&self) -> &FundingService {
        &self.funding
    }

    pub fn withdrawals(&self) -> &WithdrawalCoordinator {
        &self.withdrawals
    }

    pub fn webhooks(&self) -> &WebhookReconciler {
        &self.webhooks
    }

    /// Worker sharing this wallet's store and state machine
    pub fn worker(&self, config: WorkerConfig) -> ReconciliationWorker {
        ReconciliationWorker::new(
            self.store.clone(),
            self.withdrawals.clone(),
            self.machine.clone(),
            config,
        )
    }

    pub async fn open_account(&self, account_id: AccountId) -> Result<Account, WalletError> {
        self.store.create_account(account_id).await
    }

    pub async fn account(&self, account_id: AccountId) -> Result<Account, WalletError> {
        self.store.get_account(account_id).await
    }

    pub async fn transaction(&self, id: TransactionId) -> Result<Transaction, WalletError> {
        self.store.get_transaction(id).await
    }
}
