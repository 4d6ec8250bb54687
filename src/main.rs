//! GSALT Wallet Ledger
//!
//! Runs the reconciliation worker against the PostgreSQL ledger. Request and
//! webhook handlers embed [`gsalt_ledger::Wallet`] directly.
//!
//! Usage: `gsalt-ledger [--env <name>]` (reads `config/<name>.yaml`)

use std::sync::Arc;

use anyhow::Context;
use gsalt_ledger::config::AppConfig;
use gsalt_ledger::db::Database;
use gsalt_ledger::logging::init_logging;
use gsalt_ledger::provider::{HttpPaymentGateway, HttpPayoutProvider};
use gsalt_ledger::{Wallet, WorkerConfig};
use tracing::info;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _log_guard = init_logging(&config);

    info!(
        env = %env,
        revision = env!("BUILD_REVISION"),
        "Starting gsalt-ledger"
    );

    let db = Database::connect(&config.postgres_url, config.postgres_max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.health_check().await?;

    let store = Arc::new(db.ledger_store());
    store.ensure_schema().await?;

    let timeout = config.providers.timeout();
    let gateway = Arc::new(HttpPaymentGateway::new(
        &config.providers.payment_gateway_url,
        &config.providers.api_key,
        timeout,
    )?);
    let payout = Arc::new(HttpPayoutProvider::new(
        &config.providers.payout_url,
        &config.providers.api_key,
        timeout,
    )?);

    let wallet = Wallet::from_config(store, gateway, payout, &config);
    let worker = wallet.worker(WorkerConfig::from(&config.worker));
    worker.run().await
}
