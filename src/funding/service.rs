use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use validator::Validate;

use crate::config::FundingConfig;
use crate::error::WalletError;
use crate::ledger::{LedgerStore, NewPaymentDetails, NewTransaction, Transaction, TransactionType};
use crate::money;
use crate::payment::{PaymentStateMachine, StatusUpdate, TransactionStatus};
use crate::provider::{ChargeRequest, PAYMENT_GATEWAY, PaymentGateway, with_timeout};
use crate::requests::{PaymentRequest, TopupRequest, VoucherRedemptionRequest};

/// A charge waiting for the user to pay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingPayment {
    pub transaction: Transaction,
    pub provider_payment_id: Option<String>,
    /// Only known on the response that created the charge
    pub checkout_url: Option<String>,
    /// An earlier request with the same reference was returned
    pub replayed: bool,
}

pub struct FundingService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    machine: PaymentStateMachine,
    config: FundingConfig,
    provider_timeout: Duration,
}

impl FundingService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        machine: PaymentStateMachine,
        config: FundingConfig,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            machine,
            config,
            provider_timeout,
        }
    }

    /// Open a PENDING top-up and request a charge for it.
    ///
    /// The account is credited later, when the gateway reports the charge paid.
    pub async fn create_topup(&self, req: &TopupRequest) -> Result<PendingPayment, WalletError> {
        req.validate()?;
        let amount = positive_amount(&req.amount_gsalt)?;
        let new = NewTransaction::new(req.account_id, TransactionType::Topup, amount)
            .with_reference(req.external_reference_id.clone());
        let payment_amount = money::to_major(amount) * self.config.payment_rate;
        let currency = self.config.payment_currency.clone();
        self.open_charge(new, &req.payment_method, payment_amount, currency)
            .await
    }

    /// Open a PENDING payment, holding its amount until the charge resolves.
    pub async fn create_payment(&self, req: &PaymentRequest) -> Result<PendingPayment, WalletError> {
        req.validate()?;
        let amount = positive_amount(&req.amount_gsalt)?;
        if req.payment_amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(
                "payment amount must be greater than zero".into(),
            ));
        }
        let new = NewTransaction::new(req.account_id, TransactionType::Payment, amount)
            .with_reference(req.external_reference_id.clone())
            .with_description(req.description.clone());
        self.open_charge(
            new,
            &req.payment_method,
            req.payment_amount,
            req.payment_currency.to_uppercase(),
        )
        .await
    }

    /// Credit a redeemed voucher. The voucher code is the idempotency key, so
    /// redeeming the same code twice returns the first redemption.
    pub async fn redeem_voucher(
        &self,
        req: &VoucherRedemptionRequest,
    ) -> Result<Transaction, WalletError> {
        req.validate()?;
        let amount = positive_amount(&req.amount_gsalt)?;
        let new = NewTransaction::new(req.account_id, TransactionType::VoucherRedemption, amount)
            .with_reference(req.voucher_code.clone());

        match self.store.commit_settled(new).await {
            Ok(tx) => {
                info!(
                    tx_id = %tx.id,
                    account_id = %tx.account_id,
                    amount = tx.amount,
                    "Voucher redeemed"
                );
                Ok(tx)
            }
            Err(WalletError::DuplicateReference { existing }) => {
                info!(tx_id = %existing, "Voucher already redeemed - returning existing record (idempotent)");
                self.store.get_transaction(existing).await
            }
            Err(e) => Err(e),
        }
    }

    async fn open_charge(
        &self,
        new: NewTransaction,
        payment_method: &str,
        payment_amount: Decimal,
        payment_currency: String,
    ) -> Result<PendingPayment, WalletError> {
        if let Some(existing) = self.existing(&new).await? {
            return self.replay(existing).await;
        }

        let details = NewPaymentDetails {
            provider: PAYMENT_GATEWAY.to_string(),
            payment_amount,
            payment_currency: payment_currency.clone(),
            payment_method: Some(payment_method.to_string()),
            metadata: None,
        };

        let description = new.description.clone();
        let tx = match self.store.open_payment(new, details).await {
            Ok(tx) => tx,
            Err(WalletError::DuplicateReference { existing }) => {
                let existing = self.store.get_transaction(existing).await?;
                return self.replay(existing).await;
            }
            Err(e) => return Err(e),
        };

        let charge_req = ChargeRequest {
            reference: tx.id,
            amount: payment_amount,
            currency: payment_currency,
            payment_method: payment_method.to_string(),
            description,
        };

        match with_timeout(self.provider_timeout, self.gateway.create_charge(&charge_req)).await {
            Ok(charge) => {
                self.store
                    .attach_provider_payment(tx.id, &charge.provider_payment_id)
                    .await?;
                info!(
                    tx_id = %tx.id,
                    kind = %tx.kind,
                    amount = tx.amount,
                    provider_payment_id = %charge.provider_payment_id,
                    "Charge created"
                );
                Ok(PendingPayment {
                    transaction: tx,
                    provider_payment_id: Some(charge.provider_payment_id),
                    checkout_url: charge.checkout_url,
                    replayed: false,
                })
            }
            Err(e) if e.is_explicit_rejection() => {
                warn!(tx_id = %tx.id, error = %e, "Charge rejected by gateway");
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
                // Outcome unknown: keep PENDING, the worker expires it if never paid
                warn!(tx_id = %tx.id, error = %e, "Charge outcome unknown, left pending");
                Err(e.into())
            }
        }
    }

    async fn existing(&self, new: &NewTransaction) -> Result<Option<Transaction>, WalletError> {
        match &new.external_reference_id {
            Some(reference) => {
                self.store
                    .find_by_reference(new.account_id, new.kind, reference)
                    .await
            }
            None => Ok(None),
        }
    }

    async fn replay(&self, existing: Transaction) -> Result<PendingPayment, WalletError> {
        info!(
            tx_id = %existing.id,
            status = %existing.status,
            "Charge with reference already exists - returning existing record (idempotent)"
        );
        let details = self.store.get_payment_details(existing.id).await?;
        Ok(PendingPayment {
            transaction: existing,
            provider_payment_id: details.and_then(|d| d.provider_payment_id),
            checkout_url: None,
            replayed: true,
        })
    }
}

/// Parse a client amount that must be strictly positive
pub(crate) fn positive_amount(amount_gsalt: &str) -> Result<u64, WalletError> {
    let amount = money::to_minor_units(amount_gsalt)?;
    if amount == 0 {
        return Err(WalletError::InvalidAmount(
            "amount must be greater than zero".into(),
        ));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountId, MemoryLedgerStore};
    use crate::provider::mock::{MockBehavior, MockPaymentGateway};

    struct Fixture {
        store: Arc<MemoryLedgerStore>,
        gateway: Arc<MockPaymentGateway>,
        service: FundingService,
        account: AccountId,
    }

    async fn fixture(balance: u64) -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let account = AccountId::new();
        store.create_account(account).await.unwrap();
        if balance > 0 {
            store.apply_credit(account, balance).await.unwrap();
        }
        let service = FundingService::new(
            store.clone(),
            gateway.clone(),
            PaymentStateMachine::new(store.clone()),
            FundingConfig::default(),
            Duration::from_secs(5),
        );
        Fixture {
            store,
            gateway,
            service,
            account,
        }
    }

    fn topup(account: AccountId, amount: &str, reference: &str) -> TopupRequest {
        TopupRequest {
            account_id: account,
            amount_gsalt: amount.into(),
            payment_method: "QRIS".into(),
            external_reference_id: reference.into(),
        }
    }

    #[tokio::test]
    async fn test_topup_opens_pending_charge() {
        let f = fixture(1000).await;
        let pending = f
            .service
            .create_topup(&topup(f.account, "50.00", "top-1"))
            .await
            .unwrap();

        assert_eq!(pending.transaction.amount, 5000);
        assert_eq!(pending.transaction.status, TransactionStatus::Pending);
        assert!(pending.provider_payment_id.is_some());
        assert!(!pending.replayed);
        // Not credited until paid
        assert_eq!(f.store.get_account(f.account).await.unwrap().balance, 1000);

        let details = f
            .store
            .get_payment_details(pending.transaction.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.provider, PAYMENT_GATEWAY);
        assert_eq!(details.payment_amount, Decimal::from(50_000));
        assert_eq!(details.payment_currency, "IDR");
    }

    #[tokio::test]
    async fn test_topup_same_reference_returns_original() {
        let f = fixture(0).await;
        let first = f
            .service
            .create_topup(&topup(f.account, "50.00", "top-1"))
            .await
            .unwrap();
        let second = f
            .service
            .create_topup(&topup(f.account, "50.00", "top-1"))
            .await
            .unwrap();

        assert!(second.replayed);
        assert_eq!(second.transaction.id, first.transaction.id);
        assert_eq!(second.provider_payment_id, first.provider_payment_id);
        assert_eq!(f.gateway.charge_count(), 1);
        assert_eq!(f.store.transactions_for(f.account).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_topup_zero_amount_rejected() {
        let f = fixture(0).await;
        let err = f
            .service
            .create_topup(&topup(f.account, "0.00", "top-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        assert_eq!(f.gateway.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_charge_fails_transaction() {
        let f = fixture(0).await;
        f.gateway.set_behavior(MockBehavior::Reject);

        let err = f
            .service
            .create_topup(&topup(f.account, "50.00", "top-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Provider(_)));

        let tx = f
            .store
            .find_by_reference(f.account, TransactionType::Topup, "top-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_payment_holds_and_releases_on_rejection() {
        let f = fixture(3000).await;
        let req = PaymentRequest {
            account_id: f.account,
            amount_gsalt: "20.00".into(),
            payment_amount: Decimal::from(20_000),
            payment_currency: "IDR".into(),
            payment_method: "EWALLET".into(),
            external_reference_id: "pay-1".into(),
            description: Some("merchant order 77".into()),
        };

        let pending = f.service.create_payment(&req).await.unwrap();
        assert_eq!(f.store.get_account(f.account).await.unwrap().balance, 1000);
        let details = f
            .store
            .get_payment_details(pending.transaction.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.payment_amount, Decimal::from(20_000));
        assert_eq!(details.payment_currency, "IDR");

        f.gateway.set_behavior(MockBehavior::Reject);
        let req = PaymentRequest {
            external_reference_id: "pay-2".into(),
            amount_gsalt: "5.00".into(),
            ..req
        };
        assert!(f.service.create_payment(&req).await.is_err());
        assert_eq!(f.store.get_account(f.account).await.unwrap().balance, 1000);
    }

    #[tokio::test]
    async fn test_payment_requires_positive_price() {
        let f = fixture(3000).await;
        let req = PaymentRequest {
            account_id: f.account,
            amount_gsalt: "20.00".into(),
            payment_amount: Decimal::ZERO,
            payment_currency: "IDR".into(),
            payment_method: "EWALLET".into(),
            external_reference_id: "pay-0".into(),
            description: None,
        };
        let err = f.service.create_payment(&req).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        assert_eq!(f.gateway.charge_count(), 0);
        assert_eq!(f.store.get_account(f.account).await.unwrap().balance, 3000);
    }

    #[tokio::test]
    async fn test_payment_timeout_keeps_hold() {
        let f = fixture(3000).await;
        f.gateway.set_behavior(MockBehavior::Timeout);
        let req = PaymentRequest {
            account_id: f.account,
            amount_gsalt: "20.00".into(),
            payment_amount: Decimal::from(20_000),
            payment_currency: "IDR".into(),
            payment_method: "EWALLET".into(),
            external_reference_id: "pay-1".into(),
            description: None,
        };

        assert!(f.service.create_payment(&req).await.is_err());
        let tx = f
            .store
            .find_by_reference(f.account, TransactionType::Payment, "pay-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(f.store.get_account(f.account).await.unwrap().balance, 1000);
    }

    #[tokio::test]
    async fn test_payment_insufficient_balance() {
        let f = fixture(100).await;
        let req = PaymentRequest {
            account_id: f.account,
            amount_gsalt: "20.00".into(),
            payment_amount: Decimal::from(20_000),
            payment_currency: "IDR".into(),
            payment_method: "EWALLET".into(),
            external_reference_id: "pay-1".into(),
            description: None,
        };
        let err = f.service.create_payment(&req).await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientBalance { .. }));
        assert_eq!(f.gateway.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_voucher_redemption_is_idempotent() {
        let f = fixture(0).await;
        let req = VoucherRedemptionRequest {
            account_id: f.account,
            amount_gsalt: "10.00".into(),
            voucher_code: "WELCOME10".into(),
        };

        let first = f.service.redeem_voucher(&req).await.unwrap();
        let second = f.service.redeem_voucher(&req).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.status, TransactionStatus::Completed);
        assert_eq!(f.store.get_account(f.account).await.unwrap().balance, 1000);
    }
}
