//! Mock providers for testing

use super::*;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scripted outcome for the next provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Succeed,
    Reject,
    Timeout,
}

pub struct MockPaymentGateway {
    charge_count: AtomicUsize,
    behavior: Mutex<MockBehavior>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self {
            charge_count: AtomicUsize::new(0),
            behavior: Mutex::new(MockBehavior::Succeed),
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn charge_count(&self) -> usize {
        self.charge_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_charge(&self, req: &ChargeRequest) -> Result<Charge, ProviderError> {
        self.charge_count.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            MockBehavior::Succeed => Ok(Charge {
                provider_payment_id: format!("inv-{}", req.reference),
                checkout_url: Some(format!("https://pay.test/{}", req.reference)),
            }),
            MockBehavior::Reject => Err(ProviderError::Rejected("payment method disabled".into())),
            MockBehavior::Timeout => Err(ProviderError::Timeout),
        }
    }
}

pub struct MockPayoutProvider {
    inquiry_count: AtomicUsize,
    submit_count: AtomicUsize,
    status_count: AtomicUsize,
    account_holder: Mutex<String>,
    invalid_account: Mutex<bool>,
    submit_behavior: Mutex<MockBehavior>,
    remote_status: Mutex<String>,
    remote_status_by_reference: Mutex<HashMap<TransactionId, String>>,
}

impl MockPayoutProvider {
    pub fn new() -> Self {
        Self {
            inquiry_count: AtomicUsize::new(0),
            submit_count: AtomicUsize::new(0),
            status_count: AtomicUsize::new(0),
            account_holder: Mutex::new("Budi Santoso".to_string()),
            invalid_account: Mutex::new(false),
            submit_behavior: Mutex::new(MockBehavior::Succeed),
            remote_status: Mutex::new("PENDING".to_string()),
            remote_status_by_reference: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_account_holder(&self, holder: &str) {
        *self.account_holder.lock().unwrap() = holder.to_string();
    }

    pub fn set_invalid_account(&self, invalid: bool) {
        *self.invalid_account.lock().unwrap() = invalid;
    }

    pub fn set_submit_behavior(&self, behavior: MockBehavior) {
        *self.submit_behavior.lock().unwrap() = behavior;
    }

    pub fn set_remote_status(&self, status: &str) {
        *self.remote_status.lock().unwrap() = status.to_string();
    }

    /// Status reported for one reference, overriding [`set_remote_status`](Self::set_remote_status)
    pub fn set_remote_status_for(&self, reference: TransactionId, status: &str) {
        self.remote_status_by_reference
            .lock()
            .unwrap()
            .insert(reference, status.to_string());
    }

    pub fn inquiry_count(&self) -> usize {
        self.inquiry_count.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PayoutProvider for MockPayoutProvider {
    async fn validate_bank_account(
        &self,
        bank_code: &str,
        account_number: &str,
    ) -> Result<BankAccountInfo, ProviderError> {
        self.inquiry_count.fetch_add(1, Ordering::SeqCst);
        if *self.invalid_account.lock().unwrap() {
            return Err(ProviderError::Rejected("account not found".into()));
        }
        Ok(BankAccountInfo {
            bank_code: bank_code.to_string(),
            account_number: account_number.to_string(),
            account_holder: self.account_holder.lock().unwrap().clone(),
        })
    }

    async fn submit_disbursement(
        &self,
        req: &DisbursementRequest,
    ) -> Result<Disbursement, ProviderError> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.submit_behavior.lock().unwrap();
        match behavior {
            MockBehavior::Succeed => Ok(Disbursement {
                provider_payment_id: format!("disb-{}", req.reference),
                status: "PENDING".into(),
            }),
            MockBehavior::Reject => Err(ProviderError::Rejected("insufficient float".into())),
            MockBehavior::Timeout => Err(ProviderError::Timeout),
        }
    }

    async fn disbursement_status(
        &self,
        reference: TransactionId,
    ) -> Result<DisbursementStatus, ProviderError> {
        self.status_count.fetch_add(1, Ordering::SeqCst);
        let status = match self.remote_status_by_reference.lock().unwrap().get(&reference) {
            Some(status) => status.clone(),
            None => self.remote_status.lock().unwrap().clone(),
        };
        Ok(DisbursementStatus {
            provider_payment_id: format!("disb-{}", reference),
            status,
            failure_reason: None,
            updated_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway_behaviors() {
        let gateway = MockPaymentGateway::new();
        let req = ChargeRequest {
            reference: TransactionId::new(),
            amount: Decimal::new(100, 0),
            currency: "IDR".into(),
            payment_method: "QRIS".into(),
            description: None,
        };

        assert!(gateway.create_charge(&req).await.is_ok());
        gateway.set_behavior(MockBehavior::Reject);
        assert!(gateway.create_charge(&req).await.unwrap_err().is_explicit_rejection());
        gateway.set_behavior(MockBehavior::Timeout);
        assert_eq!(gateway.create_charge(&req).await.unwrap_err(), ProviderError::Timeout);
        assert_eq!(gateway.charge_count(), 3);
    }
}
