//! Provider Status Vocabularies
//!
//! Each provider reports status in its own words. A vocabulary maps those
//! words onto [`TransactionStatus`]; anything unknown is rejected before the
//! ledger is touched.

use serde::{Deserialize, Serialize};

use super::state::TransactionStatus;
use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusVocabulary {
    /// Invoice / charge callbacks from the payment gateway
    Invoice,
    /// Disbursement callbacks and status polls from the payout provider
    Disbursement,
}

impl StatusVocabulary {
    pub fn map(&self, raw: &str) -> Result<TransactionStatus, WalletError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let status = match (self, normalized.as_str()) {
            (StatusVocabulary::Invoice, "PAID" | "SETTLED" | "COMPLETED") => {
                TransactionStatus::Completed
            }
            (StatusVocabulary::Invoice, "PENDING") => TransactionStatus::Pending,
            (StatusVocabulary::Invoice, "EXPIRED") => TransactionStatus::Expired,
            (StatusVocabulary::Invoice, "FAILED") => TransactionStatus::Failed,

            (StatusVocabulary::Disbursement, "COMPLETED") => TransactionStatus::Completed,
            (StatusVocabulary::Disbursement, "PENDING" | "ACCEPTED") => TransactionStatus::Pending,
            (StatusVocabulary::Disbursement, "FAILED") => TransactionStatus::Failed,
            (StatusVocabulary::Disbursement, "CANCELLED") => TransactionStatus::Cancelled,

            _ => return Err(WalletError::UnsupportedProviderStatus(raw.to_string())),
        };
        Ok(status)
    }
}
