//! HTTP provider clients (JSON over reqwest, bearer API key)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    BankAccountInfo, Charge, ChargeRequest, Disbursement, DisbursementRequest, DisbursementStatus,
    PaymentGateway, PayoutProvider, ProviderError,
};
use crate::ledger::TransactionId;

/// Shared JSON client with a bounded request timeout
#[derive(Clone)]
struct JsonClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl JsonClient {
    fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, ProviderError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<R>()
                .await
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = %status, body = %body, "Provider returned error status");
        Err(map_status_error(status, body))
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<R, ProviderError> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        self.send(request).await
    }

    async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<R, ProviderError> {
        self.send(self.client.get(self.url(path)).query(query)).await
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        warn!(error = %e, "Provider transport error");
        ProviderError::Unavailable(e.to_string())
    }
}

fn map_status_error(status: StatusCode, body: String) -> ProviderError {
    if status == StatusCode::NOT_FOUND {
        ProviderError::NotFound(body)
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        ProviderError::Timeout
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ProviderError::Unavailable(format!("{}: {}", status, body))
    } else {
        ProviderError::Rejected(format!("{}: {}", status, body))
    }
}

// ============================================================================
// Payment gateway
// ============================================================================

#[derive(Serialize)]
struct InvoiceBody<'a> {
    external_id: String,
    amount: Decimal,
    currency: &'a str,
    payment_method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Deserialize)]
struct InvoiceResponse {
    id: String,
    #[serde(default)]
    invoice_url: Option<String>,
}

pub struct HttpPaymentGateway {
    client: JsonClient,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: JsonClient::new(base_url, api_key, timeout)?,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_charge(&self, req: &ChargeRequest) -> Result<Charge, ProviderError> {
        let external_id = req.reference.to_string();
        let body = InvoiceBody {
            external_id: external_id.clone(),
            amount: req.amount,
            currency: &req.currency,
            payment_method: &req.payment_method,
            description: req.description.as_deref(),
        };
        let invoice: InvoiceResponse = self
            .client
            .post("/v2/invoices", &body, Some(&external_id))
            .await?;
        Ok(Charge {
            provider_payment_id: invoice.id,
            checkout_url: invoice.invoice_url,
        })
    }
}

// ============================================================================
// Payout provider
// ============================================================================

#[derive(Serialize)]
struct InquiryBody<'a> {
    bank_code: &'a str,
    account_number: &'a str,
}

#[derive(Deserialize)]
struct InquiryResponse {
    bank_code: String,
    account_number: String,
    account_holder_name: String,
    #[serde(default = "default_true")]
    is_valid: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct DisbursementBody<'a> {
    external_id: String,
    amount: Decimal,
    currency: &'a str,
    bank_code: &'a str,
    account_number: &'a str,
    account_holder_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Deserialize)]
struct DisbursementResponse {
    id: String,
    status: String,
    #[serde(default)]
    failure_code: Option<String>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
}

pub struct HttpPayoutProvider {
    client: JsonClient,
}

impl HttpPayoutProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: JsonClient::new(base_url, api_key, timeout)?,
        })
    }
}

#[async_trait]
impl PayoutProvider for HttpPayoutProvider {
    async fn validate_bank_account(
        &self,
        bank_code: &str,
        account_number: &str,
    ) -> Result<BankAccountInfo, ProviderError> {
        let body = InquiryBody {
            bank_code,
            account_number,
        };
        let inquiry: InquiryResponse = match self
            .client
            .post("/bank_account_inquiry", &body, None)
            .await
        {
            Ok(inquiry) => inquiry,
            Err(ProviderError::NotFound(msg)) => return Err(ProviderError::Rejected(msg)),
            Err(e) => return Err(e),
        };

        if !inquiry.is_valid {
            return Err(ProviderError::Rejected(format!(
                "account {} at {} is not valid",
                account_number, bank_code
            )));
        }
        Ok(BankAccountInfo {
            bank_code: inquiry.bank_code,
            account_number: inquiry.account_number,
            account_holder: inquiry.account_holder_name,
        })
    }

    async fn submit_disbursement(
        &self,
        req: &DisbursementRequest,
    ) -> Result<Disbursement, ProviderError> {
        let external_id = req.reference.to_string();
        let body = DisbursementBody {
            external_id: external_id.clone(),
            amount: req.amount,
            currency: &req.currency,
            bank_code: &req.bank_code,
            account_number: &req.account_number,
            account_holder_name: &req.recipient_name,
            description: req.description.as_deref(),
        };
        let response: DisbursementResponse = self
            .client
            .post("/disbursements", &body, Some(&external_id))
            .await?;
        Ok(Disbursement {
            provider_payment_id: response.id,
            status: response.status,
        })
    }

    async fn disbursement_status(
        &self,
        reference: TransactionId,
    ) -> Result<DisbursementStatus, ProviderError> {
        let external_id = reference.to_string();
        let response: DisbursementResponse = self
            .client
            .get("/disbursements", &[("external_id", external_id.as_str())])
            .await?;
        Ok(DisbursementStatus {
            provider_payment_id: response.id,
            status: response.status,
            failure_reason: response.failure_code,
            updated_at: response.updated,
        })
    }
}
