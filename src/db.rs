//! PostgreSQL connection pool for the ledger store

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::error::WalletError;
use crate::ledger::PgLedgerStore;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, WalletError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "Ledger database pool established");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ledger store sharing this pool
    pub fn ledger_store(&self) -> PgLedgerStore {
        PgLedgerStore::new(self.pool.clone())
    }

    pub async fn health_check(&self) -> Result<(), WalletError> {
        let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        if one != 1 {
            return Err(WalletError::DatabaseError("unexpected health check result".into()));
        }
        Ok(())
    }
}
