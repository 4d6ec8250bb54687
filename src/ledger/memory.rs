//! In-Memory Ledger Store
//!
//! Process-local [`LedgerStore`] backed by one mutex over the whole ledger.
//! Every operation validates first and mutates second while holding the
//! lock, so a failed call leaves no partial writes behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::store::LedgerStore;
use super::types::{
    Account, AccountId, AccountStatus, CorrelationId, NewPaymentDetails, NewTransaction,
    PROVIDER_STATUS_PENDING, PaymentDetails, Transaction, TransactionId, TransactionType,
    TransferEntry, TransferPair, WebhookEvent,
};
use crate::error::WalletError;
use crate::payment::{
    BalanceEffect, StatusUpdate, TransactionStatus, TransitionCheck, TransitionOutcome,
};

type ReferenceKey = (AccountId, TransactionType, String);

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<TransactionId, Transaction>,
    references: HashMap<ReferenceKey, TransactionId>,
    payment_details: HashMap<TransactionId, PaymentDetails>,
    provider_index: HashMap<(String, String), TransactionId>,
    last_polled: HashMap<TransactionId, DateTime<Utc>>,
    webhook_events: Vec<WebhookEvent>,
}

impl LedgerState {
    fn account(&self, id: AccountId) -> Result<&Account, WalletError> {
        self.accounts
            .get(&id)
            .ok_or_else(|| WalletError::NotFound(format!("account {}", id)))
    }

    fn active_account(&self, id: AccountId) -> Result<&Account, WalletError> {
        let account = self.account(id)?;
        if !account.is_active() {
            return Err(WalletError::AccountNotActive(id));
        }
        Ok(account)
    }

    fn transaction(&self, id: TransactionId) -> Result<&Transaction, WalletError> {
        self.transactions
            .get(&id)
            .ok_or_else(|| WalletError::NotFound(format!("transaction {}", id)))
    }

    /// Balance after debiting an active account
    fn debited_balance(&self, id: AccountId, amount: u64) -> Result<u64, WalletError> {
        let account = self.active_account(id)?;
        account
            .balance
            .checked_sub(amount)
            .ok_or(WalletError::InsufficientBalance {
                available: account.balance,
                requested: amount,
            })
    }

    /// Balance after crediting `account`
    fn credited_balance(account: &Account, amount: u64) -> Result<u64, WalletError> {
        account
            .balance
            .checked_add(amount)
            .ok_or_else(|| WalletError::InvalidAmount("balance would overflow".into()))
    }

    fn set_balance(&mut self, id: AccountId, balance: u64, now: DateTime<Utc>) {
        if let Some(account) = self.accounts.get_mut(&id) {
            account.balance = balance;
            account.updated_at = now;
        }
    }

    fn check_new(&self, new: &NewTransaction) -> Result<(), WalletError> {
        if new.amount == 0 {
            return Err(WalletError::InvalidAmount(
                "amount must be greater than zero".into(),
            ));
        }
        self.account(new.account_id)?;
        if let Some(reference) = &new.external_reference_id {
            let key = (new.account_id, new.kind, reference.clone());
            if let Some(existing) = self.references.get(&key) {
                return Err(WalletError::DuplicateReference {
                    existing: *existing,
                });
            }
        }
        Ok(())
    }

    fn insert_transaction(
        &mut self,
        new: NewTransaction,
        status: TransactionStatus,
        correlation_id: Option<CorrelationId>,
        now: DateTime<Utc>,
    ) -> Transaction {
        let tx = Transaction {
            id: TransactionId::new(),
            account_id: new.account_id,
            kind: new.kind,
            amount: new.amount,
            status,
            external_reference_id: new.external_reference_id,
            correlation_id,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        if let Some(reference) = &tx.external_reference_id {
            self.references
                .insert((tx.account_id, tx.kind, reference.clone()), tx.id);
        }
        self.transactions.insert(tx.id, tx.clone());
        tx
    }
}

pub struct MemoryLedgerStore {
    state: Mutex<LedgerState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, WalletError> {
        self.state
            .lock()
            .map_err(|_| WalletError::Internal("ledger state lock poisoned".into()))
    }

    /// Webhook deliveries recorded so far, oldest first
    pub fn webhook_events(&self) -> Result<Vec<WebhookEvent>, WalletError> {
        Ok(self.lock()?.webhook_events.clone())
    }

    /// Every transaction of an account, oldest first
    pub fn transactions_for(&self, account_id: AccountId) -> Result<Vec<Transaction>, WalletError> {
        let state = self.lock()?;
        let mut txs: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|tx| tx.account_id == account_id)
            .cloned()
            .collect();
        txs.sort_by_key(|tx| tx.id);
        Ok(txs)
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A reported provider id must match the one already attached
fn check_provider_payment(details: &PaymentDetails, update: &StatusUpdate) -> Result<(), WalletError> {
    match (&details.provider_payment_id, &update.provider_payment_id) {
        (Some(attached), Some(reported)) if attached != reported => Err(WalletError::InvalidRequest(
            format!("provider payment id {} does not match {}", reported, attached),
        )),
        _ => Ok(()),
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_account(&self, account_id: AccountId) -> Result<Account, WalletError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.accounts.get(&account_id) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let account = Account {
            id: account_id,
            balance: 0,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(account_id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Account, WalletError> {
        Ok(self.lock()?.account(account_id)?.clone())
    }

    async fn set_account_status(
        &self,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<Account, WalletError> {
        let mut state = self.lock()?;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| WalletError::NotFound(format!("account {}", account_id)))?;
        account.status = status;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn apply_credit(&self, account_id: AccountId, amount: u64) -> Result<Account, WalletError> {
        let mut state = self.lock()?;
        let balance = LedgerState::credited_balance(state.active_account(account_id)?, amount)?;
        state.set_balance(account_id, balance, Utc::now());
        Ok(state.account(account_id)?.clone())
    }

    async fn apply_debit(&self, account_id: AccountId, amount: u64) -> Result<Account, WalletError> {
        let mut state = self.lock()?;
        let balance = state.debited_balance(account_id, amount)?;
        state.set_balance(account_id, balance, Utc::now());
        Ok(state.account(account_id)?.clone())
    }

    async fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, WalletError> {
        if new.kind.holds_funds() {
            return Err(WalletError::InvalidRequest(format!(
                "{} must be opened with payment details",
                new.kind
            )));
        }
        let mut state = self.lock()?;
        state.check_new(&new)?;
        Ok(state.insert_transaction(new, TransactionStatus::Pending, None, Utc::now()))
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, WalletError> {
        Ok(self.lock()?.transaction(id)?.clone())
    }

    async fn find_by_reference(
        &self,
        account_id: AccountId,
        kind: TransactionType,
        external_reference_id: &str,
    ) -> Result<Option<Transaction>, WalletError> {
        let state = self.lock()?;
        let key = (account_id, kind, external_reference_id.to_string());
        Ok(state
            .references
            .get(&key)
            .and_then(|id| state.transactions.get(id))
            .cloned())
    }

    async fn find_by_provider_payment(
        &self,
        provider: &str,
        provider_payment_id: &str,
    ) -> Result<Option<Transaction>, WalletError> {
        let state = self.lock()?;
        let key = (provider.to_string(), provider_payment_id.to_string());
        Ok(state
            .provider_index
            .get(&key)
            .and_then(|id| state.transactions.get(id))
            .cloned())
    }

    async fn get_payment_details(
        &self,
        id: TransactionId,
    ) -> Result<Option<PaymentDetails>, WalletError> {
        Ok(self.lock()?.payment_details.get(&id).cloned())
    }

    async fn list_pending(
        &self,
        kind: TransactionType,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, WalletError> {
        let state = self.lock()?;
        let mut pending: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|tx| {
                tx.kind == kind
                    && tx.status == TransactionStatus::Pending
                    && tx.updated_at <= older_than
            })
            .cloned()
            .collect();
        pending.sort_by_key(|tx| (tx.updated_at, tx.id));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn claim_for_poll(
        &self,
        kind: TransactionType,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, WalletError> {
        let mut state = self.lock()?;
        let mut due: Vec<(Option<DateTime<Utc>>, Transaction)> = state
            .transactions
            .values()
            .filter(|tx| {
                tx.kind == kind
                    && tx.status == TransactionStatus::Pending
                    && tx.updated_at <= older_than
            })
            .map(|tx| (state.last_polled.get(&tx.id).copied(), tx.clone()))
            .filter(|(polled, _)| polled.is_none_or(|at| at <= older_than))
            .collect();
        // Never-polled first (None sorts before Some)
        due.sort_by_key(|(polled, tx)| (*polled, tx.updated_at, tx.id));
        due.truncate(limit);

        let now = Utc::now();
        Ok(due
            .into_iter()
            .map(|(_, tx)| {
                state.last_polled.insert(tx.id, now);
                tx
            })
            .collect())
    }

    async fn finalize_transaction(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction, WalletError> {
        let mut state = self.lock()?;
        let current = state.transaction(id)?.status;
        if current.check_transition(status)? == TransitionCheck::Apply {
            if let Some(tx) = state.transactions.get_mut(&id) {
                tx.status = status;
                tx.updated_at = Utc::now();
            }
        }
        Ok(state.transaction(id)?.clone())
    }

    async fn open_payment(
        &self,
        new: NewTransaction,
        details: NewPaymentDetails,
    ) -> Result<Transaction, WalletError> {
        let mut state = self.lock()?;
        state.check_new(&new)?;
        state.active_account(new.account_id)?;

        let now = Utc::now();
        if new.kind.holds_funds() {
            let balance = state.debited_balance(new.account_id, new.amount)?;
            state.set_balance(new.account_id, balance, now);
        }

        let tx = state.insert_transaction(new, TransactionStatus::Pending, None, now);
        state.payment_details.insert(
            tx.id,
            PaymentDetails {
                transaction_id: tx.id,
                provider: details.provider,
                provider_payment_id: None,
                payment_amount: details.payment_amount,
                payment_currency: details.payment_currency,
                payment_method: details.payment_method,
                status: PROVIDER_STATUS_PENDING.to_string(),
                status_description: None,
                payment_time: None,
                metadata: details.metadata,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(tx)
    }

    async fn attach_provider_payment(
        &self,
        id: TransactionId,
        provider_payment_id: &str,
    ) -> Result<(), WalletError> {
        let mut state = self.lock()?;
        let provider = state
            .payment_details
            .get(&id)
            .map(|d| d.provider.clone())
            .ok_or_else(|| WalletError::NotFound(format!("payment details {}", id)))?;

        let key = (provider, provider_payment_id.to_string());
        match state.provider_index.get(&key) {
            Some(bound) if *bound == id => return Ok(()),
            Some(bound) => {
                return Err(WalletError::InvalidRequest(format!(
                    "provider payment {} already bound to transaction {}",
                    provider_payment_id, bound
                )));
            }
            None => {}
        }

        state.provider_index.insert(key, id);
        if let Some(details) = state.payment_details.get_mut(&id) {
            details.provider_payment_id = Some(provider_payment_id.to_string());
            details.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn commit_transfer(&self, entry: &TransferEntry) -> Result<TransferPair, WalletError> {
        let mut state = self.lock()?;
        if entry.amount == 0 {
            return Err(WalletError::InvalidAmount(
                "amount must be greater than zero".into(),
            ));
        }
        if entry.source == entry.destination {
            return Err(WalletError::SameAccount);
        }

        let source_balance = state.debited_balance(entry.source, entry.amount)?;
        let destination_balance =
            LedgerState::credited_balance(state.active_account(entry.destination)?, entry.amount)?;

        let now = Utc::now();
        state.set_balance(entry.source, source_balance, now);
        state.set_balance(entry.destination, destination_balance, now);

        let outgoing = state.insert_transaction(
            NewTransaction::new(entry.source, TransactionType::TransferOut, entry.amount)
                .with_description(entry.description.clone()),
            TransactionStatus::Completed,
            Some(entry.correlation_id),
            now,
        );
        let incoming = state.insert_transaction(
            NewTransaction::new(entry.destination, TransactionType::TransferIn, entry.amount)
                .with_description(entry.description.clone()),
            TransactionStatus::Completed,
            Some(entry.correlation_id),
            now,
        );

        Ok(TransferPair {
            correlation_id: entry.correlation_id,
            outgoing,
            incoming,
        })
    }

    async fn commit_settled(&self, new: NewTransaction) -> Result<Transaction, WalletError> {
        let mut state = self.lock()?;
        state.check_new(&new)?;
        let balance = LedgerState::credited_balance(state.active_account(new.account_id)?, new.amount)?;

        let now = Utc::now();
        state.set_balance(new.account_id, balance, now);
        Ok(state.insert_transaction(new, TransactionStatus::Completed, None, now))
    }

    async fn commit_transition(
        &self,
        update: &StatusUpdate,
    ) -> Result<TransitionOutcome, WalletError> {
        let mut state = self.lock()?;
        let tx = state.transaction(update.transaction_id)?.clone();
        if let Some(details) = state.payment_details.get(&tx.id) {
            check_provider_payment(details, update)?;
        }

        match tx.status.check_transition(update.status)? {
            TransitionCheck::Replay => return Ok(TransitionOutcome::Replayed(tx)),
            TransitionCheck::Apply => {}
        }

        // Validate everything before the first write
        let new_balance = match BalanceEffect::for_transition(tx.kind, tx.amount, update.status) {
            BalanceEffect::Credit(amount) => Some(LedgerState::credited_balance(
                state.account(tx.account_id)?,
                amount,
            )?),
            BalanceEffect::None => None,
        };

        let provider_key = match (&update.provider_payment_id, state.payment_details.get(&tx.id)) {
            (Some(provider_payment_id), Some(details)) if details.provider_payment_id.is_none() => {
                let key = (details.provider.clone(), provider_payment_id.clone());
                if let Some(bound) = state.provider_index.get(&key) {
                    if *bound != tx.id {
                        return Err(WalletError::InvalidRequest(format!(
                            "provider payment {} already bound to transaction {}",
                            provider_payment_id, bound
                        )));
                    }
                }
                Some(key)
            }
            _ => None,
        };

        let now = Utc::now();
        if let Some(balance) = new_balance {
            state.set_balance(tx.account_id, balance, now);
        }
        if let Some(key) = provider_key {
            state.provider_index.insert(key, tx.id);
        }
        if let Some(details) = state.payment_details.get_mut(&tx.id) {
            details.status = update.provider_status.clone();
            if details.provider_payment_id.is_none() {
                details.provider_payment_id = update.provider_payment_id.clone();
            }
            if update.status == TransactionStatus::Completed {
                details.payment_time = Some(update.payment_time.unwrap_or(now));
            }
            if update.status_description.is_some() {
                details.status_description = update.status_description.clone();
            }
            details.updated_at = now;
        }

        let updated = match state.transactions.get_mut(&tx.id) {
            Some(stored) => {
                stored.status = update.status;
                stored.updated_at = now;
                stored.clone()
            }
            None => return Err(WalletError::NotFound(format!("transaction {}", tx.id))),
        };
        Ok(TransitionOutcome::Applied(updated))
    }

    async fn record_webhook_event(&self, event: &WebhookEvent) -> Result<(), WalletError> {
        self.lock()?.webhook_events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    async fn funded(store: &MemoryLedgerStore, balance: u64) -> AccountId {
        let id = AccountId::new();
        store.create_account(id).await.unwrap();
        if balance > 0 {
            store.apply_credit(id, balance).await.unwrap();
        }
        id
    }

    fn details() -> NewPaymentDetails {
        NewPaymentDetails {
            provider: "payout".into(),
            payment_amount: Decimal::new(3000, 2),
            payment_currency: "IDR".into(),
            payment_method: Some("BANK_TRANSFER".into()),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_credit_and_debit() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 1000).await;

        let account = store.apply_debit(a, 400).await.unwrap();
        assert_eq!(account.balance, 600);

        let err = store.apply_debit(a, 601).await.unwrap_err();
        assert_eq!(
            err,
            WalletError::InsufficientBalance {
                available: 600,
                requested: 601
            }
        );
        assert_eq!(store.get_account(a).await.unwrap().balance, 600);
    }

    #[tokio::test]
    async fn test_inactive_account_rejects_balance_changes() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 1000).await;
        store
            .set_account_status(a, AccountStatus::Suspended)
            .await
            .unwrap();

        assert_eq!(
            store.apply_debit(a, 1).await.unwrap_err(),
            WalletError::AccountNotActive(a)
        );
        assert_eq!(
            store.apply_credit(a, 1).await.unwrap_err(),
            WalletError::AccountNotActive(a)
        );
    }

    #[tokio::test]
    async fn test_create_transaction_duplicate_reference() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 0).await;

        let first = store
            .create_transaction(NewTransaction::new(a, TransactionType::Topup, 500).with_reference("ref-1"))
            .await
            .unwrap();
        let err = store
            .create_transaction(NewTransaction::new(a, TransactionType::Topup, 500).with_reference("ref-1"))
            .await
            .unwrap_err();
        assert_eq!(err, WalletError::DuplicateReference { existing: first.id });

        // Same reference under another type is a different key
        store
            .create_transaction(NewTransaction::new(a, TransactionType::VoucherRedemption, 500).with_reference("ref-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_transaction_zero_amount() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 0).await;
        let err = store
            .create_transaction(NewTransaction::new(a, TransactionType::Topup, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_create_transaction_refuses_holding_types() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 0).await;

        for kind in [TransactionType::Withdrawal, TransactionType::Payment] {
            let err = store
                .create_transaction(NewTransaction::new(a, kind, 3000))
                .await
                .unwrap_err();
            assert!(matches!(err, WalletError::InvalidRequest(_)));
        }
        assert!(store.transactions_for(a).unwrap().is_empty());
        assert_eq!(store.get_account(a).await.unwrap().balance, 0);
    }

    #[tokio::test]
    async fn test_create_transaction_unknown_account() {
        let store = MemoryLedgerStore::new();
        let err = store
            .create_transaction(NewTransaction::new(AccountId::new(), TransactionType::Topup, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_finalize_transaction_is_monotonic() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 0).await;
        let tx = store
            .create_transaction(NewTransaction::new(a, TransactionType::Topup, 100))
            .await
            .unwrap();

        let done = store
            .finalize_transaction(tx.id, TransactionStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, TransactionStatus::Completed);

        // Same terminal status: no-op
        let again = store
            .finalize_transaction(tx.id, TransactionStatus::Completed)
            .await
            .unwrap();
        assert_eq!(again, done);

        let err = store
            .finalize_transaction(tx.id, TransactionStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_open_payment_holds_funds() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 4000).await;

        let tx = store
            .open_payment(
                NewTransaction::new(a, TransactionType::Withdrawal, 3000).with_reference("wd-1"),
                details(),
            )
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(store.get_account(a).await.unwrap().balance, 1000);

        let details = store.get_payment_details(tx.id).await.unwrap().unwrap();
        assert_eq!(details.status, PROVIDER_STATUS_PENDING);
        assert!(details.provider_payment_id.is_none());
    }

    #[tokio::test]
    async fn test_open_payment_insufficient_leaves_nothing() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 100).await;

        let err = store
            .open_payment(
                NewTransaction::new(a, TransactionType::Withdrawal, 3000).with_reference("wd-1"),
                details(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientBalance { .. }));
        assert!(store.transactions_for(a).unwrap().is_empty());
        assert!(
            store
                .find_by_reference(a, TransactionType::Withdrawal, "wd-1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_attach_provider_payment_is_unique() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 10_000).await;
        let first = store
            .open_payment(NewTransaction::new(a, TransactionType::Withdrawal, 100), details())
            .await
            .unwrap();
        let second = store
            .open_payment(NewTransaction::new(a, TransactionType::Withdrawal, 100), details())
            .await
            .unwrap();

        store.attach_provider_payment(first.id, "disb-1").await.unwrap();
        store.attach_provider_payment(first.id, "disb-1").await.unwrap();
        assert!(store.attach_provider_payment(second.id, "disb-1").await.is_err());

        let found = store
            .find_by_provider_payment("payout", "disb-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_commit_transfer_conserves_balance() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 6000).await;
        let b = funded(&store, 0).await;

        let pair = store
            .commit_transfer(&TransferEntry {
                correlation_id: CorrelationId::new(),
                source: a,
                destination: b,
                amount: 2000,
                description: None,
            })
            .await
            .unwrap();

        assert_eq!(pair.outgoing.kind, TransactionType::TransferOut);
        assert_eq!(pair.incoming.kind, TransactionType::TransferIn);
        assert_eq!(pair.outgoing.correlation_id, pair.incoming.correlation_id);
        assert_eq!(store.get_account(a).await.unwrap().balance, 4000);
        assert_eq!(store.get_account(b).await.unwrap().balance, 2000);
    }

    #[tokio::test]
    async fn test_commit_transfer_to_missing_account_is_atomic() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 6000).await;

        let err = store
            .commit_transfer(&TransferEntry {
                correlation_id: CorrelationId::new(),
                source: a,
                destination: AccountId::new(),
                amount: 2000,
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::NotFound(_)));
        assert_eq!(store.get_account(a).await.unwrap().balance, 6000);
        assert!(store.transactions_for(a).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_transition_releases_hold_once() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 4000).await;
        let tx = store
            .open_payment(NewTransaction::new(a, TransactionType::Withdrawal, 3000), details())
            .await
            .unwrap();

        let update = StatusUpdate::new(tx.id, TransactionStatus::Failed)
            .with_description(Some("bank rejected".into()));
        let outcome = store.commit_transition(&update).await.unwrap();
        assert!(outcome.is_applied());
        assert_eq!(store.get_account(a).await.unwrap().balance, 4000);

        let outcome = store.commit_transition(&update).await.unwrap();
        assert!(matches!(outcome, TransitionOutcome::Replayed(_)));
        assert_eq!(store.get_account(a).await.unwrap().balance, 4000);

        let details = store.get_payment_details(tx.id).await.unwrap().unwrap();
        assert_eq!(details.status, "FAILED");
        assert_eq!(details.status_description.as_deref(), Some("bank rejected"));
    }

    #[tokio::test]
    async fn test_commit_transition_rejects_other_provider_id() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 4000).await;
        let tx = store
            .open_payment(NewTransaction::new(a, TransactionType::Withdrawal, 3000), details())
            .await
            .unwrap();
        store.attach_provider_payment(tx.id, "disb-1").await.unwrap();

        let update = StatusUpdate::new(tx.id, TransactionStatus::Failed)
            .with_provider_status("FAILED")
            .with_provider_payment_id(Some("disb-2".into()));
        let err = store.commit_transition(&update).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidRequest(_)));
        assert_eq!(
            store.get_transaction(tx.id).await.unwrap().status,
            TransactionStatus::Pending
        );
        assert_eq!(store.get_account(a).await.unwrap().balance, 1000);

        // The attached id still settles it
        let update = StatusUpdate::new(tx.id, TransactionStatus::Failed)
            .with_provider_status("FAILED")
            .with_provider_payment_id(Some("disb-1".into()));
        store.commit_transition(&update).await.unwrap();
        assert_eq!(store.get_account(a).await.unwrap().balance, 4000);
    }

    #[tokio::test]
    async fn test_claim_for_poll_rotates_through_backlog() {
        let store = MemoryLedgerStore::new();
        let a = funded(&store, 10_000).await;
        let first = store
            .open_payment(NewTransaction::new(a, TransactionType::Withdrawal, 100), details())
            .await
            .unwrap();
        let second = store
            .open_payment(NewTransaction::new(a, TransactionType::Withdrawal, 100), details())
            .await
            .unwrap();

        let mut claimed = Vec::new();
        for _ in 0..3 {
            let batch = store
                .claim_for_poll(TransactionType::Withdrawal, Utc::now(), 1)
                .await
                .unwrap();
            assert_eq!(batch.len(), 1);
            claimed.push(batch[0].id);
        }
        assert_ne!(claimed[0], claimed[1]);
        assert!(claimed[..2].contains(&first.id));
        assert!(claimed[..2].contains(&second.id));
        // Least recently polled comes round again
        assert_eq!(claimed[2], claimed[0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_overdraw() {
        let store = Arc::new(MemoryLedgerStore::new());
        let a = funded(&store, 1000).await;

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.apply_debit(a, 100).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(store.get_account(a).await.unwrap().balance, 0);
    }
}
