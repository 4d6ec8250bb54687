//! Funding
//!
//! Money entering the wallet or leaving it for a merchant: gateway-backed
//! top-ups and payments, and voucher redemptions credited on the spot.

pub mod service;

pub use service::{FundingService, PendingPayment};
