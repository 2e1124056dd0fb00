use sqlx::SqliteConnection;

use crate::{
    db_types::{NewSale, Sale},
    traits::LedgerError,
};
use super::returned_row;

pub async fn insert_sale(sale: NewSale, conn: &mut SqliteConnection) -> Result<Sale, LedgerError> {
    let rows: Vec<Sale> = sqlx::query_as(
        r#"INSERT INTO sales (bot_id, seller_id, buyer_id, amount, sale_type, transaction_ref)
        VALUES ($1, $2, $3, $4, $5, $6) RETURNING *;"#,
    )
    .bind(sale.bot_id)
    .bind(sale.seller_id)
    .bind(sale.buyer_id)
    .bind(sale.amount.value())
    .bind(sale.sale_type.to_string())
    .bind(sale.transaction_ref)
    .fetch_all(conn)
    .await?;
    returned_row(rows, "Sale insert")
}

pub async fn fetch_sales_for_bot(bot_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Sale>, LedgerError> {
    let sales = sqlx::query_as("SELECT * FROM sales WHERE bot_id = $1 ORDER BY id").bind(bot_id).fetch_all(conn).await?;
    Ok(sales)
}
