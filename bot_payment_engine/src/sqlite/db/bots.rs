use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Bot, NewBot},
    traits::LedgerError,
};
use super::returned_row;

pub async fn insert_bot(bot: NewBot, conn: &mut SqliteConnection) -> Result<Bot, LedgerError> {
    let rows: Vec<Bot> = sqlx::query_as(
        r#"INSERT INTO bots (name, price, rent_price, owner_id) VALUES ($1, $2, $3, $4) RETURNING *;"#,
    )
    .bind(bot.name)
    .bind(bot.price.value())
    .bind(bot.rent_price.value())
    .bind(bot.owner_id)
    .fetch_all(conn)
    .await?;
    let bot = returned_row(rows, "Bot insert")?;
    debug!("🗃️ Bot #{} ({}) listed by user #{}", bot.id, bot.name, bot.owner_id);
    Ok(bot)
}

pub async fn fetch_bot(bot_id: i64, conn: &mut SqliteConnection) -> Result<Option<Bot>, LedgerError> {
    let bot = sqlx::query_as("SELECT * FROM bots WHERE id = $1").bind(bot_id).fetch_optional(conn).await?;
    Ok(bot)
}

/// The one place a bot changes hands.
pub async fn set_owner(bot_id: i64, new_owner: i64, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    let result = sqlx::query("UPDATE bots SET owner_id = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(bot_id)
        .bind(new_owner)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::BotNotFound(bot_id));
    }
    Ok(())
}
