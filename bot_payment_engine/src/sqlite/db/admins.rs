use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{BankDetails, PayoutProfile},
    traits::LedgerError,
};
use super::returned_row;

pub async fn fetch_payout_profile(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutProfile>, LedgerError> {
    let profile =
        sqlx::query_as("SELECT * FROM admins WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(profile)
}

/// Creates an empty payout profile for the user if there isn't one already.
pub async fn ensure_payout_profile(user_id: i64, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    sqlx::query("INSERT INTO admins (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn upsert_bank_details(
    user_id: i64,
    details: BankDetails,
    conn: &mut SqliteConnection,
) -> Result<PayoutProfile, LedgerError> {
    let rows: Vec<PayoutProfile> = sqlx::query_as(
        r#"INSERT INTO admins (user_id, bank_code, account_number, account_name) VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO UPDATE SET
            bank_code = excluded.bank_code,
            account_number = excluded.account_number,
            account_name = excluded.account_name,
            updated_at = CURRENT_TIMESTAMP
        RETURNING *;"#,
    )
    .bind(user_id)
    .bind(details.bank_code)
    .bind(details.account_number)
    .bind(details.account_name)
    .fetch_all(conn)
    .await?;
    let profile = returned_row(rows, "Bank details upsert")?;
    debug!("🗃️ Bank details for admin #{user_id} updated");
    Ok(profile)
}

pub async fn save_subaccount_code(
    user_id: i64,
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<PayoutProfile, LedgerError> {
    let rows: Vec<PayoutProfile> = sqlx::query_as(
        "UPDATE admins SET subaccount_code = $2, updated_at = CURRENT_TIMESTAMP WHERE user_id = $1 RETURNING *",
    )
    .bind(user_id)
    .bind(code)
    .fetch_all(conn)
    .await?;
    rows.into_iter().next().ok_or(LedgerError::UserNotFound(user_id))
}
