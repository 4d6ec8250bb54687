//! Reconciliation Worker
//!
//! Background worker that settles what webhooks did not: it polls the payout
//! provider for withdrawals stuck in PENDING and expires charges that were
//! never paid.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::WorkerSettings;
use crate::error::WalletError;
use crate::ledger::{LedgerStore, TransactionType};
use crate::payment::{PaymentStateMachine, StatusUpdate, TransactionStatus};
use crate::withdrawal::WithdrawalCoordinator;

/// Provider status polls in flight at once
const POLL_CONCURRENCY: usize = 8;

/// Provider status recorded when the worker expires an unpaid charge
pub const EXPIRED_BY_WORKER: &str = "EXPIRED";

/// Configuration for the reconciliation worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// How often to scan
    pub scan_interval: Duration,
    /// How long a withdrawal must sit in PENDING before it is polled
    pub stale_threshold: Duration,
    /// How long a charge may stay unpaid before it expires
    pub charge_ttl: Duration,
    /// Maximum transactions of each kind per scan
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&WorkerSettings::default())
    }
}

impl From<&WorkerSettings> for WorkerConfig {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            scan_interval: Duration::from_secs(settings.scan_interval_secs),
            stale_threshold: Duration::from_secs(settings.stale_threshold_secs),
            charge_ttl: Duration::from_secs(settings.charge_ttl_secs),
            batch_size: settings.batch_size,
        }
    }
}

/// Counts from one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Withdrawals whose provider status was queried
    pub polled: usize,
    /// Polled withdrawals that reached a terminal status
    pub settled: usize,
    /// Charges moved to EXPIRED
    pub expired: usize,
}

pub struct ReconciliationWorker {
    store: Arc<dyn LedgerStore>,
    withdrawals: Arc<WithdrawalCoordinator>,
    machine: PaymentStateMachine,
    config: WorkerConfig,
}

impl ReconciliationWorker {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        withdrawals: Arc<WithdrawalCoordinator>,
        machine: PaymentStateMachine,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            withdrawals,
            machine,
            config,
        }
    }

    /// Run the worker loop forever
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            stale_threshold_secs = self.config.stale_threshold.as_secs(),
            charge_ttl_secs = self.config.charge_ttl.as_secs(),
            "Starting reconciliation worker"
        );

        loop {
            if let Err(e) = self.scan_and_recover().await {
                error!(error = %e, "Reconciliation scan failed");
            }

            tokio::time::sleep(self.config.scan_interval).await;
        }
    }

    /// Run a single scan. Per-item failures are logged and skipped.
    pub async fn scan_and_recover(&self) -> Result<ScanReport, WalletError> {
        let (polled, settled) = self.poll_withdrawals().await?;
        let mut expired = 0;
        for kind in [TransactionType::Topup, TransactionType::Payment] {
            expired += self.expire_charges(kind).await?;
        }

        let report = ScanReport {
            polled,
            settled,
            expired,
        };
        if report == ScanReport::default() {
            debug!("Nothing to reconcile");
        } else {
            info!(
                polled = report.polled,
                settled = report.settled,
                expired = report.expired,
                "Reconciliation scan finished"
            );
        }
        Ok(report)
    }

    async fn poll_withdrawals(&self) -> Result<(usize, usize), WalletError> {
        let cutoff = cutoff(self.config.stale_threshold)?;
        let stale = self
            .store
            .claim_for_poll(TransactionType::Withdrawal, cutoff, self.config.batch_size)
            .await?;
        if stale.is_empty() {
            return Ok((0, 0));
        }
        debug!(count = stale.len(), "Polling stale withdrawals");

        let polled = stale.len();
        let settled = stream::iter(stale)
            .map(|tx| async move {
                match self.withdrawals.check_withdrawal_status(tx.id).await {
                    Ok(updated) if updated.status.is_terminal() => {
                        info!(
                            tx_id = %updated.id,
                            status = %updated.status,
                            "Stale withdrawal settled"
                        );
                        true
                    }
                    Ok(_) => false,
                    Err(e) => {
                        warn!(tx_id = %tx.id, error = %e, "Failed to poll withdrawal");
                        false
                    }
                }
            })
            .buffer_unordered(POLL_CONCURRENCY)
            .filter(|settled| futures::future::ready(*settled))
            .count()
            .await;

        Ok((polled, settled))
    }

    async fn expire_charges(&self, kind: TransactionType) -> Result<usize, WalletError> {
        let unpaid = self
            .store
            .list_pending(kind, cutoff(self.config.charge_ttl)?, self.config.batch_size)
            .await?;
        let mut expired = 0;

        for tx in unpaid {
            let update = StatusUpdate::new(tx.id, TransactionStatus::Expired)
                .with_provider_status(EXPIRED_BY_WORKER)
                .with_description(Some("charge not paid in time".to_string()));
            match self.machine.apply_status_update(update).await {
                Ok(outcome) if outcome.is_applied() => expired += 1,
                Ok(_) => {}
                // A webhook settled it between the scan and the update
                Err(WalletError::InvalidTransition { .. }) => {
                    debug!(tx_id = %tx.id, "Charge settled before expiry");
                }
                Err(e) => {
                    error!(tx_id = %tx.id, kind = %kind, error = %e, "Failed to expire charge");
                }
            }
        }

        Ok(expired)
    }
}

/// Instant `age` ago
fn cutoff(age: Duration) -> Result<DateTime<Utc>, WalletError> {
    let age = chrono::Duration::from_std(age)
        .map_err(|e| WalletError::Internal(format!("worker age out of range: {}", e)))?;
    Ok(Utc::now() - age)
}
