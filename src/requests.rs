//! Inbound Requests
//!
//! Shapes accepted from the request layer. The account is resolved by the
//! caller's authentication and passed in explicitly as a typed [`AccountId`].
//! Amounts stay decimal strings until they reach the amount codec.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ledger::AccountId;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TopupRequest {
    pub account_id: AccountId,
    #[validate(length(min = 1, max = 32))]
    pub amount_gsalt: String,
    #[validate(length(min = 1, max = 32))]
    pub payment_method: String,
    #[validate(length(min = 1, max = 64))]
    pub external_reference_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferRequest {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    #[validate(length(min = 1, max = 32))]
    pub amount_gsalt: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentRequest {
    pub account_id: AccountId,
    #[validate(length(min = 1, max = 32))]
    pub amount_gsalt: String,
    /// Merchant price in `payment_currency`
    pub payment_amount: Decimal,
    #[validate(length(equal = 3))]
    pub payment_currency: String,
    #[validate(length(min = 1, max = 32))]
    pub payment_method: String,
    #[validate(length(min = 1, max = 64))]
    pub external_reference_id: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WithdrawalRequest {
    pub account_id: AccountId,
    #[validate(length(min = 1, max = 32))]
    pub amount_gsalt: String,
    #[validate(length(min = 2, max = 16))]
    pub bank_code: String,
    #[validate(length(min = 5, max = 32))]
    pub account_number: String,
    #[validate(length(min = 1, max = 128))]
    pub recipient_name: String,
    #[validate(length(min = 1, max = 64))]
    pub external_reference_id: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VoucherRedemptionRequest {
    pub account_id: AccountId,
    #[validate(length(min = 1, max = 32))]
    pub amount_gsalt: String,
    #[validate(length(min = 1, max = 64))]
    pub voucher_code: String,
}
