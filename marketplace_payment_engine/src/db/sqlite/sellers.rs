use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{
        BankVerificationStatus,
        KycStatus,
        LinkedAccountStatus,
        NewBankAccount,
        SellerBankAccount,
        SellerKyc,
        SellerLinkedAccount,
    },
};

const KYC_COLUMNS: &str = "id, seller_id, legal_name, pan_number, status, created_at, updated_at";
const BANK_COLUMNS: &str = "id, seller_id, account_number_masked, ifsc_code, holder_name, verification_status, \
     is_active, is_primary, created_at, updated_at";
const LINKED_COLUMNS: &str = "id, seller_id, gateway_account_id, status, created_at, updated_at";

pub async fn upsert_kyc(
    seller_id: &str,
    legal_name: &str,
    pan_number: &str,
    conn: &mut SqliteConnection,
) -> Result<SellerKyc, SqliteDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO seller_kyc (seller_id, legal_name, pan_number, status)
            VALUES ($1, $2, $3, 'Pending')
            ON CONFLICT (seller_id) DO UPDATE SET
                legal_name = excluded.legal_name,
                pan_number = excluded.pan_number,
                updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(seller_id)
    .bind(legal_name)
    .bind(pan_number)
    .execute(&mut *conn)
    .await?;
    fetch_kyc(seller_id, conn).await?.ok_or_else(|| SqliteDatabaseError::QueryError("kyc upsert vanished".into()))
}

pub async fn set_kyc_status(
    seller_id: &str,
    status: KycStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<SellerKyc>, SqliteDatabaseError> {
    let result =
        sqlx::query("UPDATE seller_kyc SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE seller_id = $2")
            .bind(status)
            .bind(seller_id)
            .execute(&mut *conn)
            .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    debug!("🗃️ Seller {seller_id} KYC status set to {status}");
    fetch_kyc(seller_id, conn).await
}

pub async fn fetch_kyc(seller_id: &str, conn: &mut SqliteConnection) -> Result<Option<SellerKyc>, SqliteDatabaseError> {
    let q = format!("SELECT {KYC_COLUMNS} FROM seller_kyc WHERE seller_id = $1");
    let kyc = sqlx::query_as::<_, SellerKyc>(&q).bind(seller_id).fetch_optional(conn).await?;
    Ok(kyc)
}

/// Inserts a bank account. When the new account is primary, all other accounts for the seller are
/// demoted first so at most one primary exists per seller. Run inside a transaction.
pub async fn insert_bank_account(
    account: &NewBankAccount,
    conn: &mut SqliteConnection,
) -> Result<SellerBankAccount, SqliteDatabaseError> {
    if account.is_primary {
        sqlx::query("UPDATE seller_bank_accounts SET is_primary = 0, updated_at = CURRENT_TIMESTAMP WHERE seller_id = $1")
            .bind(&account.seller_id)
            .execute(&mut *conn)
            .await?;
    }
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO seller_bank_accounts (
                seller_id, account_number_masked, ifsc_code, holder_name, verification_status, is_active, is_primary
            ) VALUES ($1, $2, $3, $4, 'Pending', 1, $5)
            RETURNING id;
        "#,
    )
    .bind(&account.seller_id)
    .bind(&account.account_number_masked)
    .bind(&account.ifsc_code)
    .bind(&account.holder_name)
    .bind(account.is_primary)
    .fetch_one(&mut *conn)
    .await?;
    fetch_bank_account(id, conn).await?.ok_or_else(|| SqliteDatabaseError::QueryError("bank account insert vanished".into()))
}

pub async fn fetch_bank_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<SellerBankAccount>, SqliteDatabaseError> {
    let q = format!("SELECT {BANK_COLUMNS} FROM seller_bank_accounts WHERE id = $1");
    let account = sqlx::query_as::<_, SellerBankAccount>(&q).bind(account_id).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn set_bank_verification(
    account_id: i64,
    status: BankVerificationStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<SellerBankAccount>, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE seller_bank_accounts SET verification_status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
    )
    .bind(status)
    .bind(account_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    fetch_bank_account(account_id, conn).await
}

/// The seller's active primary account, if any. Callers wanting the payout gate must additionally
/// check `verification_status`.
pub async fn fetch_primary_bank_account(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<SellerBankAccount>, SqliteDatabaseError> {
    let q = format!(
        "SELECT {BANK_COLUMNS} FROM seller_bank_accounts WHERE seller_id = $1 AND is_active = 1 AND is_primary = 1 \
         ORDER BY id DESC LIMIT 1"
    );
    let account = sqlx::query_as::<_, SellerBankAccount>(&q).bind(seller_id).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn upsert_linked_account(
    seller_id: &str,
    gateway_account_id: &str,
    conn: &mut SqliteConnection,
) -> Result<SellerLinkedAccount, SqliteDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO seller_linked_accounts (seller_id, gateway_account_id, status)
            VALUES ($1, $2, 'Created')
            ON CONFLICT (seller_id) DO UPDATE SET
                gateway_account_id = excluded.gateway_account_id,
                updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(seller_id)
    .bind(gateway_account_id)
    .execute(&mut *conn)
    .await?;
    fetch_linked_account(seller_id, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::QueryError("linked account upsert vanished".into()))
}

pub async fn set_linked_account_status(
    seller_id: &str,
    status: LinkedAccountStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<SellerLinkedAccount>, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE seller_linked_accounts SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE seller_id = $2",
    )
    .bind(status)
    .bind(seller_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    fetch_linked_account(seller_id, conn).await
}

pub async fn fetch_linked_account(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<SellerLinkedAccount>, SqliteDatabaseError> {
    let q = format!("SELECT {LINKED_COLUMNS} FROM seller_linked_accounts WHERE seller_id = $1");
    let account = sqlx::query_as::<_, SellerLinkedAccount>(&q).bind(seller_id).fetch_optional(conn).await?;
    Ok(account)
}
