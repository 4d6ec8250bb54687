//! Webhook Reconciler
//!
//! Accepts provider callbacks, which may arrive late, out of order or more
//! than once, and feeds them to the payment state machine. Every delivery is
//! acknowledged and written to the webhook event log.

pub mod payload;
pub mod reconciler;

pub use payload::{DisbursementCallback, InvoiceCallback, NormalizedWebhook, WebhookPayload};
pub use reconciler::{Acknowledgement, WebhookReconciler};
