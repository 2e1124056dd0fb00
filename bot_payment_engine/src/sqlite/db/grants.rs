use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{AccessType, EntitlementGrant, NewGrant},
    traits::LedgerError,
};
use super::returned_row;

/// Removes the purchase grants of everyone except `keep_user`. Used when ownership moves to a new buyer.
pub async fn revoke_purchase_grants(
    bot_id: i64,
    keep_user: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, LedgerError> {
    let result = sqlx::query("DELETE FROM user_bots WHERE bot_id = $1 AND access_type = 'purchase' AND user_id <> $2")
        .bind(bot_id)
        .bind(keep_user)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

async fn fetch_equivalent_grant(
    grant: &NewGrant,
    conn: &mut SqliteConnection,
) -> Result<Option<EntitlementGrant>, LedgerError> {
    let existing: Option<EntitlementGrant> = match grant.access_type {
        AccessType::Purchase => {
            sqlx::query_as("SELECT * FROM user_bots WHERE user_id = $1 AND bot_id = $2 AND access_type = 'purchase'")
                .bind(grant.user_id)
                .bind(grant.bot_id)
                .fetch_optional(conn)
                .await?
        },
        AccessType::Rent => {
            sqlx::query_as("SELECT * FROM user_bots WHERE transaction_id = $1")
                .bind(grant.transaction_id)
                .fetch_optional(conn)
                .await?
        },
    };
    Ok(existing)
}

pub async fn insert_grant_if_absent(
    grant: NewGrant,
    conn: &mut SqliteConnection,
) -> Result<EntitlementGrant, LedgerError> {
    if let Some(existing) = fetch_equivalent_grant(&grant, conn).await? {
        trace!("🗃️ User #{} already holds grant #{} on bot #{}", grant.user_id, existing.id, grant.bot_id);
        return Ok(existing);
    }
    let rows: Vec<EntitlementGrant> = sqlx::query_as(
        r#"INSERT INTO user_bots (user_id, bot_id, access_type, is_active, expiry_date, transaction_id)
        VALUES ($1, $2, $3, TRUE, $4, $5) RETURNING *;"#,
    )
    .bind(grant.user_id)
    .bind(grant.bot_id)
    .bind(grant.access_type.to_string())
    .bind(grant.expiry_date)
    .bind(grant.transaction_id)
    .fetch_all(conn)
    .await?;
    let inserted = returned_row(rows, "Grant insert")?;
    debug!(
        "🗃️ {} grant #{} created for user #{} on bot #{}",
        inserted.access_type, inserted.id, inserted.user_id, inserted.bot_id
    );
    Ok(inserted)
}

pub async fn fetch_grants_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<EntitlementGrant>, LedgerError> {
    let grants =
        sqlx::query_as("SELECT * FROM user_bots WHERE user_id = $1 ORDER BY id").bind(user_id).fetch_all(conn).await?;
    Ok(grants)
}

pub async fn fetch_grants_for_user_and_bot(
    user_id: i64,
    bot_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<EntitlementGrant>, LedgerError> {
    let grants = sqlx::query_as("SELECT * FROM user_bots WHERE user_id = $1 AND bot_id = $2 ORDER BY id")
        .bind(user_id)
        .bind(bot_id)
        .fetch_all(conn)
        .await?;
    Ok(grants)
}

pub async fn fetch_grants_for_bot(bot_id: i64, conn: &mut SqliteConnection) -> Result<Vec<EntitlementGrant>, LedgerError> {
    let grants =
        sqlx::query_as("SELECT * FROM user_bots WHERE bot_id = $1 ORDER BY id").bind(bot_id).fetch_all(conn).await?;
    Ok(grants)
}
