use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{MinorUnits, NewTransaction, PaymentType, RevenueSplit, Transaction, TransactionStatus},
    traits::{InsertTransactionResult, LedgerError},
};
use super::returned_row;

const INSERT_COLUMNS: &str = r#"
    INSERT INTO transactions (
        user_id,
        admin_id,
        bot_id,
        amount,
        company_share,
        admin_share,
        company_percent,
        reference,
        status,
        payment_channel,
        payment_type,
        description
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $10, $11)
"#;

/// Inserts a new pending transaction. A duplicate reference is reported as [`LedgerError::UniqueViolation`].
pub async fn insert_transaction(tx: NewTransaction, conn: &mut SqliteConnection) -> Result<Transaction, LedgerError> {
    let sql = format!("{INSERT_COLUMNS} RETURNING *;");
    let rows = bind_new_transaction(sqlx::query_as(&sql), tx).fetch_all(conn).await?;
    returned_row(rows, "Transaction insert")
}

/// Inserts the transaction unless one with the same reference exists, in which case the existing record is returned.
pub async fn idempotent_insert(
    tx: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<InsertTransactionResult, LedgerError> {
    let reference = tx.reference.clone();
    let sql = format!("{INSERT_COLUMNS} ON CONFLICT (reference) DO NOTHING RETURNING *;");
    let inserted =
        bind_new_transaction(sqlx::query_as(&sql), tx).fetch_all(&mut *conn).await?.into_iter().next();
    match inserted {
        Some(tx) => {
            debug!("🗃️ Transaction [{reference}] inserted with id {}", tx.id);
            Ok(InsertTransactionResult::Inserted(tx))
        },
        None => {
            let existing = fetch_transaction_by_reference(&reference, conn)
                .await?
                .ok_or_else(|| LedgerError::TransactionNotFound(reference.clone()))?;
            trace!("🗃️ Transaction [{reference}] already exists with id {}", existing.id);
            Ok(InsertTransactionResult::AlreadyExists(existing))
        },
    }
}

fn bind_new_transaction<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Sqlite, Transaction, sqlx::sqlite::SqliteArguments<'q>>,
    tx: NewTransaction,
) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, Transaction, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(tx.user_id)
        .bind(tx.admin_id)
        .bind(tx.bot_id)
        .bind(tx.amount.value())
        .bind(tx.split.company_share.value())
        .bind(tx.split.admin_share.value())
        .bind(i64::from(tx.split.company_percent))
        .bind(tx.reference)
        .bind(tx.payment_channel)
        .bind(tx.payment_type.to_string())
        .bind(tx.description)
}

pub async fn fetch_transaction_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(tx)
}

/// Issues a no-op write against the transaction row before reading it.
///
/// SQLite has no `SELECT ... FOR UPDATE`. A write is the first statement of the unit, so the connection takes the
/// database write lock here and holds it until commit or rollback. A concurrent reconciliation of the same reference
/// blocks on this statement and then reads the committed status.
pub async fn lock_transaction(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    sqlx::query("UPDATE transactions SET updated_at = updated_at WHERE reference = $1")
        .bind(reference)
        .execute(&mut *conn)
        .await?;
    fetch_transaction_by_reference(reference, conn).await
}

pub async fn find_transaction(
    user_id: i64,
    bot_id: i64,
    payment_type: PaymentType,
    status: TransactionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let tx = sqlx::query_as(
        r#"SELECT * FROM transactions
        WHERE user_id = $1 AND bot_id = $2 AND payment_type = $3 AND status = $4
        ORDER BY id DESC LIMIT 1"#,
    )
    .bind(user_id)
    .bind(bot_id)
    .bind(payment_type.to_string())
    .bind(status.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

pub async fn fetch_other_successful_purchase(
    user_id: i64,
    bot_id: i64,
    excluding_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let tx = sqlx::query_as(
        r#"SELECT * FROM transactions
        WHERE user_id = $1 AND bot_id = $2 AND payment_type = 'purchase' AND status = 'success' AND reference <> $3
        LIMIT 1"#,
    )
    .bind(user_id)
    .bind(bot_id)
    .bind(excluding_reference)
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

pub async fn mark_success(
    reference: &str,
    paid: MinorUnits,
    split: RevenueSplit,
    conn: &mut SqliteConnection,
) -> Result<Transaction, LedgerError> {
    let updated: Vec<Transaction> = sqlx::query_as(
        r#"UPDATE transactions SET
            status = 'success',
            amount = $2,
            company_share = $3,
            admin_share = $4,
            company_percent = $5,
            updated_at = CURRENT_TIMESTAMP
        WHERE reference = $1 AND status = 'pending'
        RETURNING *"#,
    )
    .bind(reference)
    .bind(paid.value())
    .bind(split.company_share.value())
    .bind(split.admin_share.value())
    .bind(i64::from(split.company_percent))
    .fetch_all(&mut *conn)
    .await?;
    match updated.into_iter().next() {
        Some(tx) => Ok(tx),
        None => Err(status_change_error(reference, TransactionStatus::Success, conn).await),
    }
}

pub async fn mark_failed(reference: &str, conn: &mut SqliteConnection) -> Result<Transaction, LedgerError> {
    let updated: Vec<Transaction> = sqlx::query_as(
        r#"UPDATE transactions SET status = 'failed', updated_at = CURRENT_TIMESTAMP
        WHERE reference = $1 AND status = 'pending'
        RETURNING *"#,
    )
    .bind(reference)
    .fetch_all(&mut *conn)
    .await?;
    match updated.into_iter().next() {
        Some(tx) => Ok(tx),
        None => Err(status_change_error(reference, TransactionStatus::Failed, conn).await),
    }
}

async fn status_change_error(reference: &str, to: TransactionStatus, conn: &mut SqliteConnection) -> LedgerError {
    match fetch_transaction_by_reference(reference, conn).await {
        Ok(Some(tx)) => LedgerError::IllegalStatusChange { reference: reference.to_string(), from: tx.status, to },
        Ok(None) => LedgerError::TransactionNotFound(reference.to_string()),
        Err(e) => e,
    }
}

pub async fn fetch_transactions_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, LedgerError> {
    let txs = sqlx::query_as("SELECT * FROM transactions WHERE user_id = $1 ORDER BY id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(txs)
}

pub async fn fetch_all_transactions(conn: &mut SqliteConnection) -> Result<Vec<Transaction>, LedgerError> {
    let txs = sqlx::query_as("SELECT * FROM transactions ORDER BY id DESC").fetch_all(conn).await?;
    Ok(txs)
}
