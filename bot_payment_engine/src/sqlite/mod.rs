//! SQLite backend for the bot payment engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::{SqliteDatabase, SqliteLedgerUnit};
