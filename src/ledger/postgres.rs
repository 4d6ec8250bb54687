//! PostgreSQL Ledger Store
//!
//! Every mutating operation runs in one database transaction. Account rows
//! are locked with `SELECT ... FOR UPDATE` before their balance is read, and
//! two-account operations lock in ascending account id order. Transaction
//! status writes are CAS updates guarded by the expected current status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

use super::store::LedgerStore;
use super::types::{
    Account, AccountId, AccountStatus, CorrelationId, NewPaymentDetails, NewTransaction,
    PROVIDER_STATUS_PENDING, PaymentDetails, Transaction, TransactionId, TransactionType,
    TransferEntry, TransferPair, WebhookEvent,
};
use crate::error::WalletError;
use crate::payment::{
    BalanceEffect, StatusUpdate, TransactionStatus, TransitionCheck, TransitionOutcome,
};

const SCHEMA: &str = include_str!("../../migrations/0001_wallet.sql");

const ACCOUNT_COLUMNS: &str = "account_id, balance, status, created_at, updated_at";

const TX_COLUMNS: &str = "transaction_id, account_id, tx_type, amount, status, \
     external_reference_id, correlation_id, description, created_at, updated_at";

const DETAILS_COLUMNS: &str = "transaction_id, provider, provider_payment_id, payment_amount, \
     payment_currency, payment_method, status, status_description, payment_time, metadata, \
     created_at, updated_at";

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), WalletError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Ledger schema ready");
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn to_db_amount(amount: u64) -> Result<i64, WalletError> {
    i64::try_from(amount)
        .map_err(|_| WalletError::InvalidAmount("amount exceeds storage range".into()))
}

fn from_db_amount(value: i64, column: &str) -> Result<u64, WalletError> {
    u64::try_from(value)
        .map_err(|_| WalletError::Internal(format!("negative value in column {}", column)))
}

fn row_to_account(row: &PgRow) -> Result<Account, WalletError> {
    let status_id: i16 = row.try_get("status")?;
    Ok(Account {
        id: AccountId::from_uuid(row.try_get("account_id")?),
        balance: from_db_amount(row.try_get("balance")?, "balance")?,
        status: AccountStatus::from_id(status_id)
            .ok_or_else(|| WalletError::Internal(format!("unknown account status {}", status_id)))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction, WalletError> {
    let id: String = row.try_get("transaction_id")?;
    let kind_id: i16 = row.try_get("tx_type")?;
    let status_id: i16 = row.try_get("status")?;
    let correlation_id: Option<String> = row.try_get("correlation_id")?;

    Ok(Transaction {
        id: id
            .parse()
            .map_err(|e| WalletError::Internal(format!("invalid transaction_id {}: {}", id, e)))?,
        account_id: AccountId::from_uuid(row.try_get("account_id")?),
        kind: TransactionType::from_id(kind_id)
            .ok_or_else(|| WalletError::Internal(format!("unknown tx_type {}", kind_id)))?,
        amount: from_db_amount(row.try_get("amount")?, "amount")?,
        status: TransactionStatus::from_id(status_id)
            .ok_or_else(|| WalletError::Internal(format!("unknown status {}", status_id)))?,
        external_reference_id: row.try_get("external_reference_id")?,
        correlation_id: correlation_id
            .map(|c| {
                c.parse::<CorrelationId>()
                    .map_err(|e| WalletError::Internal(format!("invalid correlation_id: {}", e)))
            })
            .transpose()?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_details(row: &PgRow) -> Result<PaymentDetails, WalletError> {
    let id: String = row.try_get("transaction_id")?;
    Ok(PaymentDetails {
        transaction_id: id
            .parse()
            .map_err(|e| WalletError::Internal(format!("invalid transaction_id {}: {}", id, e)))?,
        provider: row.try_get("provider")?,
        provider_payment_id: row.try_get("provider_payment_id")?,
        payment_amount: row.try_get("payment_amount")?,
        payment_currency: row.try_get("payment_currency")?,
        payment_method: row.try_get("payment_method")?,
        status: row.try_get("status")?,
        status_description: row.try_get("status_description")?,
        payment_time: row.try_get("payment_time")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// Statement helpers (run inside a caller-owned transaction)
// ============================================================================

async fn lock_account(conn: &mut PgConnection, id: AccountId) -> Result<Account, WalletError> {
    let sql = format!(
        "SELECT {} FROM accounts_tb WHERE account_id = $1 FOR UPDATE",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| WalletError::NotFound(format!("account {}", id)))?;
    row_to_account(&row)
}

async fn lock_active_account(
    conn: &mut PgConnection,
    id: AccountId,
) -> Result<Account, WalletError> {
    let account = lock_account(conn, id).await?;
    if !account.is_active() {
        return Err(WalletError::AccountNotActive(id));
    }
    Ok(account)
}

async fn write_balance(
    conn: &mut PgConnection,
    id: AccountId,
    balance: u64,
) -> Result<Account, WalletError> {
    let sql = format!(
        "UPDATE accounts_tb SET balance = $1, updated_at = NOW() WHERE account_id = $2 RETURNING {}",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(to_db_amount(balance)?)
        .bind(id.as_uuid())
        .fetch_one(&mut *conn)
        .await?;
    row_to_account(&row)
}

async fn debit_locked(
    conn: &mut PgConnection,
    id: AccountId,
    amount: u64,
) -> Result<Account, WalletError> {
    let account = lock_active_account(conn, id).await?;
    let balance = account
        .balance
        .checked_sub(amount)
        .ok_or(WalletError::InsufficientBalance {
            available: account.balance,
            requested: amount,
        })?;
    write_balance(conn, id, balance).await
}

async fn credit_locked(
    conn: &mut PgConnection,
    account: &Account,
    amount: u64,
) -> Result<Account, WalletError> {
    let balance = account
        .balance
        .checked_add(amount)
        .ok_or_else(|| WalletError::InvalidAmount("balance would overflow".into()))?;
    write_balance(conn, account.id, balance).await
}

async fn reference_owner(
    conn: &mut PgConnection,
    new: &NewTransaction,
) -> Result<Option<TransactionId>, WalletError> {
    let Some(reference) = &new.external_reference_id else {
        return Ok(None);
    };
    let id: Option<String> = sqlx::query_scalar(
        r#"
        SELECT transaction_id FROM transactions_tb
        WHERE account_id = $1 AND tx_type = $2 AND external_reference_id = $3
        "#,
    )
    .bind(new.account_id.as_uuid())
    .bind(new.kind.id())
    .bind(reference)
    .fetch_optional(&mut *conn)
    .await?;

    id.map(|id| {
        id.parse::<TransactionId>()
            .map_err(|e| WalletError::Internal(format!("invalid transaction_id: {}", e)))
    })
    .transpose()
}

async fn check_new(conn: &mut PgConnection, new: &NewTransaction) -> Result<(), WalletError> {
    if new.amount == 0 {
        return Err(WalletError::InvalidAmount(
            "amount must be greater than zero".into(),
        ));
    }
    lock_account(conn, new.account_id).await?;
    if let Some(existing) = reference_owner(conn, new).await? {
        return Err(WalletError::DuplicateReference { existing });
    }
    Ok(())
}

/// Insert a transaction row. A concurrent insert of the same reference is
/// reported as `DuplicateReference` instead of a constraint violation.
async fn insert_transaction(
    conn: &mut PgConnection,
    new: &NewTransaction,
    status: TransactionStatus,
    correlation_id: Option<CorrelationId>,
) -> Result<Transaction, WalletError> {
    let sql = format!(
        r#"
        INSERT INTO transactions_tb
            (transaction_id, account_id, tx_type, amount, status, external_reference_id,
             correlation_id, description, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
        ON CONFLICT (account_id, tx_type, external_reference_id)
            WHERE external_reference_id IS NOT NULL
            DO NOTHING
        RETURNING {}
        "#,
        TX_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(TransactionId::new().to_string())
        .bind(new.account_id.as_uuid())
        .bind(new.kind.id())
        .bind(to_db_amount(new.amount)?)
        .bind(status.id())
        .bind(&new.external_reference_id)
        .bind(correlation_id.map(|c| c.to_string()))
        .bind(&new.description)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => row_to_transaction(&row),
        None => match reference_owner(conn, new).await? {
            Some(existing) => Err(WalletError::DuplicateReference { existing }),
            None => Err(WalletError::Internal(
                "transaction insert conflicted without an owner".into(),
            )),
        },
    }
}

async fn lock_transaction(
    conn: &mut PgConnection,
    id: TransactionId,
) -> Result<Transaction, WalletError> {
    let sql = format!(
        "SELECT {} FROM transactions_tb WHERE transaction_id = $1 FOR UPDATE",
        TX_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| WalletError::NotFound(format!("transaction {}", id)))?;
    row_to_transaction(&row)
}

/// CAS status write: only succeeds while the row is still in `expected`
async fn update_status_if(
    conn: &mut PgConnection,
    id: TransactionId,
    expected: TransactionStatus,
    new_status: TransactionStatus,
) -> Result<Transaction, WalletError> {
    let sql = format!(
        r#"
        UPDATE transactions_tb
        SET status = $1, updated_at = NOW()
        WHERE transaction_id = $2 AND status = $3
        RETURNING {}
        "#,
        TX_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(new_status.id())
        .bind(id.to_string())
        .bind(expected.id())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(WalletError::InvalidTransition {
            from: expected,
            to: new_status,
        })?;
    row_to_transaction(&row)
}

// ============================================================================
// LedgerStore
// ============================================================================

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_account(&self, account_id: AccountId) -> Result<Account, WalletError> {
        let sql = format!(
            r#"
            INSERT INTO accounts_tb (account_id, balance, status, created_at, updated_at)
            VALUES ($1, 0, $2, NOW(), NOW())
            ON CONFLICT (account_id) DO UPDATE SET account_id = EXCLUDED.account_id
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(account_id.as_uuid())
            .bind(AccountStatus::Active.id())
            .fetch_one(&self.pool)
            .await?;
        row_to_account(&row)
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Account, WalletError> {
        let sql = format!(
            "SELECT {} FROM accounts_tb WHERE account_id = $1",
            ACCOUNT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(account_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| WalletError::NotFound(format!("account {}", account_id)))?;
        row_to_account(&row)
    }

    async fn set_account_status(
        &self,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<Account, WalletError> {
        let sql = format!(
            "UPDATE accounts_tb SET status = $1, updated_at = NOW() WHERE account_id = $2 RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(status.id())
            .bind(account_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| WalletError::NotFound(format!("account {}", account_id)))?;
        row_to_account(&row)
    }

    async fn apply_credit(&self, account_id: AccountId, amount: u64) -> Result<Account, WalletError> {
        let mut tx = self.pool.begin().await?;
        let account = lock_active_account(&mut tx, account_id).await?;
        let account = credit_locked(&mut tx, &account, amount).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn apply_debit(&self, account_id: AccountId, amount: u64) -> Result<Account, WalletError> {
        let mut tx = self.pool.begin().await?;
        let account = debit_locked(&mut tx, account_id, amount).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, WalletError> {
        if new.kind.holds_funds() {
            return Err(WalletError::InvalidRequest(format!(
                "{} must be opened with payment details",
                new.kind
            )));
        }
        let mut tx = self.pool.begin().await?;
        check_new(&mut tx, &new).await?;
        let created = insert_transaction(&mut tx, &new, TransactionStatus::Pending, None).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, WalletError> {
        let sql = format!(
            "SELECT {} FROM transactions_tb WHERE transaction_id = $1",
            TX_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| WalletError::NotFound(format!("transaction {}", id)))?;
        row_to_transaction(&row)
    }

    async fn find_by_reference(
        &self,
        account_id: AccountId,
        kind: TransactionType,
        external_reference_id: &str,
    ) -> Result<Option<Transaction>, WalletError> {
        let sql = format!(
            r#"
            SELECT {} FROM transactions_tb
            WHERE account_id = $1 AND tx_type = $2 AND external_reference_id = $3
            "#,
            TX_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(account_id.as_uuid())
            .bind(kind.id())
            .bind(external_reference_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn find_by_provider_payment(
        &self,
        provider: &str,
        provider_payment_id: &str,
    ) -> Result<Option<Transaction>, WalletError> {
        let sql = format!(
            r#"
            SELECT {} FROM transactions_tb
            WHERE transaction_id = (
                SELECT transaction_id FROM payment_details_tb
                WHERE provider = $1 AND provider_payment_id = $2
            )
            "#,
            TX_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(provider)
            .bind(provider_payment_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn get_payment_details(
        &self,
        id: TransactionId,
    ) -> Result<Option<PaymentDetails>, WalletError> {
        let sql = format!(
            "SELECT {} FROM payment_details_tb WHERE transaction_id = $1",
            DETAILS_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_details).transpose()
    }

    async fn list_pending(
        &self,
        kind: TransactionType,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, WalletError> {
        let sql = format!(
            r#"
            SELECT {} FROM transactions_tb
            WHERE tx_type = $1 AND status = $2 AND updated_at <= $3
            ORDER BY updated_at ASC
            LIMIT $4
            "#,
            TX_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(kind.id())
            .bind(TransactionStatus::Pending.id())
            .bind(older_than)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_transaction).collect()
    }

    async fn claim_for_poll(
        &self,
        kind: TransactionType,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, WalletError> {
        // SKIP LOCKED keeps concurrent workers off each other's rows
        let sql = format!(
            r#"
            UPDATE transactions_tb SET last_polled_at = NOW()
            WHERE transaction_id IN (
                SELECT transaction_id FROM transactions_tb
                WHERE tx_type = $1 AND status = $2 AND updated_at <= $3
                  AND (last_polled_at IS NULL OR last_polled_at <= $3)
                ORDER BY last_polled_at ASC NULLS FIRST, updated_at ASC, transaction_id ASC
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            TX_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(kind.id())
            .bind(TransactionStatus::Pending.id())
            .bind(older_than)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_transaction).collect()
    }

    async fn finalize_transaction(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction, WalletError> {
        let mut tx = self.pool.begin().await?;
        let current = lock_transaction(&mut tx, id).await?;
        let result = match current.status.check_transition(status)? {
            TransitionCheck::Apply => update_status_if(&mut tx, id, current.status, status).await?,
            TransitionCheck::Replay => current,
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn open_payment(
        &self,
        new: NewTransaction,
        details: NewPaymentDetails,
    ) -> Result<Transaction, WalletError> {
        let mut tx = self.pool.begin().await?;
        check_new(&mut tx, &new).await?;
        if new.kind.holds_funds() {
            debit_locked(&mut tx, new.account_id, new.amount).await?;
        } else {
            lock_active_account(&mut tx, new.account_id).await?;
        }

        let created = insert_transaction(&mut tx, &new, TransactionStatus::Pending, None).await?;

        sqlx::query(
            r#"
            INSERT INTO payment_details_tb
                (transaction_id, provider, payment_amount, payment_currency, payment_method,
                 status, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            "#,
        )
        .bind(created.id.to_string())
        .bind(&details.provider)
        .bind(details.payment_amount)
        .bind(&details.payment_currency)
        .bind(&details.payment_method)
        .bind(PROVIDER_STATUS_PENDING)
        .bind(&details.metadata)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn attach_provider_payment(
        &self,
        id: TransactionId,
        provider_payment_id: &str,
    ) -> Result<(), WalletError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_details_tb
            SET provider_payment_id = $1, updated_at = NOW()
            WHERE transaction_id = $2
              AND (provider_payment_id IS NULL OR provider_payment_id = $1)
            "#,
        )
        .bind(provider_payment_id)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => WalletError::InvalidRequest(
                format!("provider payment {} already bound", provider_payment_id),
            ),
            _ => WalletError::from(e),
        })?;

        if result.rows_affected() == 0 {
            return Err(WalletError::NotFound(format!(
                "payment details {} without a different provider payment id",
                id
            )));
        }
        Ok(())
    }

    async fn commit_transfer(&self, entry: &TransferEntry) -> Result<TransferPair, WalletError> {
        if entry.amount == 0 {
            return Err(WalletError::InvalidAmount(
                "amount must be greater than zero".into(),
            ));
        }
        if entry.source == entry.destination {
            return Err(WalletError::SameAccount);
        }

        let mut tx = self.pool.begin().await?;

        // Lock both rows in ascending id order
        let (first, second) = if entry.source < entry.destination {
            (entry.source, entry.destination)
        } else {
            (entry.destination, entry.source)
        };
        let first = lock_account(&mut tx, first).await?;
        let second = lock_account(&mut tx, second).await?;
        let (source, destination) = if first.id == entry.source {
            (first, second)
        } else {
            (second, first)
        };

        for account in [&source, &destination] {
            if !account.is_active() {
                return Err(WalletError::AccountNotActive(account.id));
            }
        }
        let source_balance =
            source
                .balance
                .checked_sub(entry.amount)
                .ok_or(WalletError::InsufficientBalance {
                    available: source.balance,
                    requested: entry.amount,
                })?;

        write_balance(&mut tx, source.id, source_balance).await?;
        credit_locked(&mut tx, &destination, entry.amount).await?;

        let outgoing = insert_transaction(
            &mut tx,
            &NewTransaction::new(entry.source, TransactionType::TransferOut, entry.amount)
                .with_description(entry.description.clone()),
            TransactionStatus::Completed,
            Some(entry.correlation_id),
        )
        .await?;
        let incoming = insert_transaction(
            &mut tx,
            &NewTransaction::new(entry.destination, TransactionType::TransferIn, entry.amount)
                .with_description(entry.description.clone()),
            TransactionStatus::Completed,
            Some(entry.correlation_id),
        )
        .await?;

        tx.commit().await?;
        Ok(TransferPair {
            correlation_id: entry.correlation_id,
            outgoing,
            incoming,
        })
    }

    async fn commit_settled(&self, new: NewTransaction) -> Result<Transaction, WalletError> {
        let mut tx = self.pool.begin().await?;
        check_new(&mut tx, &new).await?;
        let account = lock_active_account(&mut tx, new.account_id).await?;
        credit_locked(&mut tx, &account, new.amount).await?;
        let created = insert_transaction(&mut tx, &new, TransactionStatus::Completed, None).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn commit_transition(
        &self,
        update: &StatusUpdate,
    ) -> Result<TransitionOutcome, WalletError> {
        let mut tx = self.pool.begin().await?;
        let current = lock_transaction(&mut tx, update.transaction_id).await?;

        if let Some(reported) = &update.provider_payment_id {
            let attached: Option<Option<String>> = sqlx::query_scalar(
                "SELECT provider_payment_id FROM payment_details_tb WHERE transaction_id = $1",
            )
            .bind(current.id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
            if let Some(Some(attached)) = attached {
                if attached != *reported {
                    return Err(WalletError::InvalidRequest(format!(
                        "provider payment id {} does not match {}",
                        reported, attached
                    )));
                }
            }
        }

        match current.status.check_transition(update.status)? {
            TransitionCheck::Replay => return Ok(TransitionOutcome::Replayed(current)),
            TransitionCheck::Apply => {}
        }

        if let BalanceEffect::Credit(amount) =
            BalanceEffect::for_transition(current.kind, current.amount, update.status)
        {
            // Settlement and hold release must land even on a suspended account
            let account = lock_account(&mut tx, current.account_id).await?;
            credit_locked(&mut tx, &account, amount).await?;
        }

        let completed = update.status == TransactionStatus::Completed;
        sqlx::query(
            r#"
            UPDATE payment_details_tb
            SET status = $1,
                status_description = COALESCE($2, status_description),
                payment_time = CASE WHEN $3 THEN COALESCE($4, NOW()) ELSE payment_time END,
                provider_payment_id = COALESCE(provider_payment_id, $5),
                updated_at = NOW()
            WHERE transaction_id = $6
            "#,
        )
        .bind(&update.provider_status)
        .bind(&update.status_description)
        .bind(completed)
        .bind(update.payment_time)
        .bind(&update.provider_payment_id)
        .bind(current.id.to_string())
        .execute(&mut *tx)
        .await?;

        let updated = update_status_if(&mut tx, current.id, current.status, update.status).await?;
        tx.commit().await?;
        Ok(TransitionOutcome::Applied(updated))
    }

    async fn record_webhook_event(&self, event: &WebhookEvent) -> Result<(), WalletError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events_tb
                (provider, transaction_reference, provider_payment_id, provider_status,
                 transaction_id, outcome, error_code, error_message, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&event.provider)
        .bind(&event.transaction_reference)
        .bind(&event.provider_payment_id)
        .bind(&event.provider_status)
        .bind(event.transaction_id.map(|id| id.to_string()))
        .bind(event.outcome.as_str())
        .bind(&event.error_code)
        .bind(&event.error_message)
        .bind(event.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
