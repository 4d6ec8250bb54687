//! Provider Webhook Payloads
//!
//! One variant per provider callback shape. Each variant normalizes itself
//! into a [`NormalizedWebhook`]; nothing downstream inspects the variant.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::payment::StatusVocabulary;
use crate::provider::{PAYMENT_GATEWAY, PAYOUT_PROVIDER};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum WebhookPayload {
    /// Invoice status callback from the payment gateway
    #[serde(rename = "payment_gateway")]
    Invoice(InvoiceCallback),
    /// Disbursement status callback from the payout provider
    #[serde(rename = "payout_provider")]
    Disbursement(DisbursementCallback),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceCallback {
    /// Gateway invoice id
    pub id: String,
    /// Our transaction id
    pub external_id: String,
    pub status: String,
    #[serde(default)]
    pub paid_amount: Option<Decimal>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementCallback {
    /// Provider disbursement id
    pub id: String,
    /// Our transaction id
    pub external_id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub failure_code: Option<String>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

/// Provider-neutral view of a webhook
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWebhook {
    pub provider: &'static str,
    pub vocabulary: StatusVocabulary,
    pub transaction_reference: String,
    pub provider_payment_id: String,
    pub provider_status: String,
    pub amount: Option<Decimal>,
    pub timestamp: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl WebhookPayload {
    pub fn normalize(&self) -> NormalizedWebhook {
        match self {
            WebhookPayload::Invoice(cb) => cb.normalize(),
            WebhookPayload::Disbursement(cb) => cb.normalize(),
        }
    }
}

impl InvoiceCallback {
    fn normalize(&self) -> NormalizedWebhook {
        NormalizedWebhook {
            provider: PAYMENT_GATEWAY,
            vocabulary: StatusVocabulary::Invoice,
            transaction_reference: self.external_id.clone(),
            provider_payment_id: self.id.clone(),
            provider_status: self.status.clone(),
            amount: self.paid_amount,
            timestamp: self.paid_at,
            description: self.failure_reason.clone(),
        }
    }
}

impl DisbursementCallback {
    fn normalize(&self) -> NormalizedWebhook {
        NormalizedWebhook {
            provider: PAYOUT_PROVIDER,
            vocabulary: StatusVocabulary::Disbursement,
            transaction_reference: self.external_id.clone(),
            provider_payment_id: self.id.clone(),
            provider_status: self.status.clone(),
            amount: self.amount,
            timestamp: self.updated,
            description: self.failure_code.clone(),
        }
    }
}
