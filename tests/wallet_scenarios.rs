use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use gsalt_ledger::config::FundingConfig;
use gsalt_ledger::ledger::WebhookOutcome;
use gsalt_ledger::money;
use gsalt_ledger::provider::{
    BankAccountInfo, Charge, ChargeRequest, Disbursement, DisbursementRequest, DisbursementStatus,
    PaymentGateway, PayoutProvider, ProviderError,
};
use gsalt_ledger::requests::{TopupRequest, WithdrawalRequest};
use gsalt_ledger::webhook::{DisbursementCallback, InvoiceCallback};
use gsalt_ledger::{
    AccountId, LedgerStore, MemoryLedgerStore, TransactionId, TransactionStatus, Wallet,
    WalletError, WebhookPayload,
};

/// Gateway that accepts every charge
struct AcceptingGateway;

#[async_trait]
impl PaymentGateway for AcceptingGateway {
    async fn create_charge(&self, req: &ChargeRequest) -> Result<Charge, ProviderError> {
        Ok(Charge {
            provider_payment_id: format!("inv-{}", req.reference),
            checkout_url: None,
        })
    }
}

/// Payout provider that accepts every disbursement and never settles on its own
struct AcceptingPayout;

#[async_trait]
impl PayoutProvider for AcceptingPayout {
    async fn validate_bank_account(
        &self,
        bank_code: &str,
        account_number: &str,
    ) -> Result<BankAccountInfo, ProviderError> {
        Ok(BankAccountInfo {
            bank_code: bank_code.to_string(),
            account_number: account_number.to_string(),
            account_holder: "SITI RAHAYU".to_string(),
        })
    }

    async fn submit_disbursement(
        &self,
        req: &DisbursementRequest,
    ) -> Result<Disbursement, ProviderError> {
        Ok(Disbursement {
            provider_payment_id: format!("disb-{}", req.reference),
            status: "ACCEPTED".to_string(),
        })
    }

    async fn disbursement_status(
        &self,
        reference: TransactionId,
    ) -> Result<DisbursementStatus, ProviderError> {
        Ok(DisbursementStatus {
            provider_payment_id: format!("disb-{}", reference),
            status: "PENDING".to_string(),
            failure_reason: None,
            updated_at: None,
        })
    }
}

fn wallet() -> (Arc<MemoryLedgerStore>, Wallet) {
    let store = Arc::new(MemoryLedgerStore::new());
    let wallet = Wallet::new(
        store.clone(),
        Arc::new(AcceptingGateway),
        Arc::new(AcceptingPayout),
        FundingConfig::default(),
        Duration::from_secs(5),
    );
    (store, wallet)
}

async fn balance(wallet: &Wallet, account: AccountId) -> u64 {
    wallet.account(account).await.unwrap().balance
}

#[tokio::test]
async fn scenario_topup_transfer_withdrawal() {
    let (store, wallet) = wallet();
    let a = AccountId::new();
    let b = AccountId::new();
    wallet.open_account(a).await.unwrap();
    wallet.open_account(b).await.unwrap();
    store.apply_credit(a, 1000).await.unwrap();

    // Top-up 50.00, settled by webhook
    let pending = wallet
        .funding()
        .create_topup(&TopupRequest {
            account_id: a,
            amount_gsalt: "50.00".into(),
            payment_method: "VA_BCA".into(),
            external_reference_id: "topup-001".into(),
        })
        .await
        .unwrap();
    let ack = wallet
        .webhooks()
        .reconcile(WebhookPayload::Invoice(InvoiceCallback {
            id: pending.provider_payment_id.unwrap(),
            external_id: pending.transaction.id.to_string(),
            status: "COMPLETED".into(),
            paid_amount: None,
            paid_at: None,
            failure_reason: None,
        }))
        .await;
    assert_eq!(ack.outcome, WebhookOutcome::Applied);
    assert_eq!(balance(&wallet, a).await, 6000);

    // Transfer 20.00 to B
    wallet.transfers().transfer(a, b, 2000, None).await.unwrap();
    assert_eq!(balance(&wallet, a).await, 4000);
    assert_eq!(balance(&wallet, b).await, 2000);

    // Withdraw 30.00, provider reports failure, hold comes back
    let receipt = wallet
        .withdrawals()
        .initiate_withdrawal(&WithdrawalRequest {
            account_id: a,
            amount_gsalt: "30.00".into(),
            bank_code: "BNI".into(),
            account_number: "0099887766".into(),
            recipient_name: "Siti Rahayu".into(),
            external_reference_id: "wd-001".into(),
            description: None,
        })
        .await
        .unwrap();
    assert_eq!(balance(&wallet, a).await, 1000);

    let polled = wallet
        .withdrawals()
        .check_withdrawal_status(receipt.transaction.id)
        .await
        .unwrap();
    assert_eq!(polled.status, TransactionStatus::Pending);

    wallet
        .webhooks()
        .reconcile(WebhookPayload::Disbursement(DisbursementCallback {
            id: receipt.provider_payment_id.unwrap(),
            external_id: receipt.transaction.id.to_string(),
            status: "FAILED".into(),
            amount: None,
            failure_code: Some("ACCOUNT_CLOSED".into()),
            updated: None,
        }))
        .await;
    assert_eq!(balance(&wallet, a).await, 4000);
    assert_eq!(balance(&wallet, b).await, 2000);
}

#[tokio::test]
async fn scenario_insufficient_balance_leaves_no_trace() {
    let (store, wallet) = wallet();
    let a = AccountId::new();
    let b = AccountId::new();
    wallet.open_account(a).await.unwrap();
    wallet.open_account(b).await.unwrap();
    store.apply_credit(a, 1000).await.unwrap();

    let err = wallet.transfers().transfer(a, b, 5000, None).await.unwrap_err();
    assert_eq!(
        err,
        WalletError::InsufficientBalance {
            available: 1000,
            requested: 5000
        }
    );
    assert!(store.transactions_for(a).unwrap().is_empty());
    assert!(store.transactions_for(b).unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_ring_transfers_conserve_total() {
    let (store, wallet) = wallet();
    let wallet = Arc::new(wallet);
    let accounts: Vec<AccountId> = (0..4).map(|_| AccountId::new()).collect();
    for account in &accounts {
        wallet.open_account(*account).await.unwrap();
        store.apply_credit(*account, 10_000).await.unwrap();
    }

    let transfers = (0..40).map(|i| {
        let wallet = wallet.clone();
        let source = accounts[i % 4];
        let destination = accounts[(i + 1) % 4];
        async move { wallet.transfers().transfer(source, destination, 700, None).await }
    });
    let results = join_all(transfers).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let mut total = 0;
    for account in &accounts {
        total += balance(&wallet, *account).await;
    }
    assert_eq!(total, 40_000);
}

#[test]
fn scenario_amount_codec() {
    assert_eq!(money::to_minor_units("50.00").unwrap(), 5000);
    assert_eq!(money::to_minor_units("0.5").unwrap(), 50);
    assert_eq!(money::to_minor_units("1.999").unwrap(), 199);
    assert!(money::to_minor_units("-1").is_err());
    assert_eq!(money::to_decimal(5000), "50.00");
    assert_eq!(
        money::to_minor_units(&money::to_decimal(123_456)).unwrap(),
        123_456
    );
}
