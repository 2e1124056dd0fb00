//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction as the need arises and call
//! through to the functions without any other changes.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

use crate::traits::LedgerError;

pub mod admins;
pub mod bots;
pub mod grants;
pub mod sales;
pub mod transactions;
pub mod users;

const SQLITE_DB_URL: &str = "sqlite://data/bot_payments.db";
// Concurrent reconciliation units queue on the database write lock for at most this long.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Takes the single row of an `INSERT`/`UPDATE ... RETURNING` statement that was run with `fetch_all`.
///
/// Returning statements must be stepped to completion. A statement left active after its first row keeps the write
/// open, and other connections do not see it.
pub fn returned_row<T>(rows: Vec<T>, statement: &str) -> Result<T, LedgerError> {
    rows.into_iter().next().ok_or_else(|| LedgerError::DatabaseError(format!("{statement} returned no row")))
}

pub fn db_url() -> String {
    let result = env::var("BMP_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ BMP_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
