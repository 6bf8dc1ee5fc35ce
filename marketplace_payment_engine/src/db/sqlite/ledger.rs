use log::debug;
use mpg_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{AccountType, LedgerEntry, NewLedgerEntry, TransactionType},
    traits::{check_balanced, LedgerError},
};

pub(crate) const LEDGER_COLUMNS: &str = "id, transaction_id, transaction_type, account_type, account_id, \
     debit_amount, credit_amount, balance_after, currency, description, created_at";

/// Appends one balanced set of entries. The caller provides the enclosing transaction; an
/// imbalance error here must abort that transaction so nothing partial ever lands.
pub async fn record_transaction(
    transaction_id: &str,
    transaction_type: TransactionType,
    currency: &str,
    entries: &[NewLedgerEntry],
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    check_balanced(transaction_id, entries)?;
    let mut written = Vec::with_capacity(entries.len());
    for entry in entries {
        let balance = balance_for(entry.account_type, &entry.account_id, &mut *conn)
            .await
            .map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        let balance_after = balance + entry.credit_amount - entry.debit_amount;
        let id: i64 = sqlx::query_scalar(
            r#"
                INSERT INTO ledger_entries (
                    transaction_id, transaction_type, account_type, account_id,
                    debit_amount, credit_amount, balance_after, currency, description
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id;
            "#,
        )
        .bind(transaction_id)
        .bind(transaction_type)
        .bind(entry.account_type)
        .bind(&entry.account_id)
        .bind(entry.debit_amount)
        .bind(entry.credit_amount)
        .bind(balance_after)
        .bind(currency)
        .bind(&entry.description)
        .fetch_one(&mut *conn)
        .await?;
        written.push(id);
    }
    debug!("🗃️ Ledger transaction {transaction_id} recorded with {} entries", written.len());
    let q = format!("SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE id IN (SELECT value FROM json_each($1))");
    let ids = serde_json::to_string(&written).map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
    let rows = sqlx::query_as::<_, LedgerEntry>(&q).bind(ids).fetch_all(conn).await?;
    Ok(rows)
}

pub async fn balance_for(
    account_type: AccountType,
    account_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Money, SqliteDatabaseError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(credit_amount - debit_amount), 0) FROM ledger_entries \
         WHERE account_type = $1 AND account_id = $2",
    )
    .bind(account_type)
    .bind(account_id)
    .fetch_one(conn)
    .await?;
    Ok(total.into())
}

pub async fn entries_for(
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, SqliteDatabaseError> {
    let q = format!("SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE transaction_id = $1 ORDER BY id ASC");
    let entries = sqlx::query_as::<_, LedgerEntry>(&q).bind(transaction_id).fetch_all(conn).await?;
    Ok(entries)
}
