//! # Bot payment engine public API
//!
//! * [`reconciliation_api`] opens charges and turns gateway confirmations, from whichever path they arrive, into
//!   durable transactions, ownership transfers and access grants.
//! * [`entitlement`] holds the pure pricing and split rules the reconciliation core applies.
//! * [`accounts_api`] answers read-side questions: a user's history and grants, bot access, the revenue summary.
//! * [`upgrade_api`] runs the user-to-admin upgrade workflow.
//!
//! Each API is created by handing it a backend that implements the traits it needs:
//!
//! ```rust,ignore
//! use bot_payment_engine::{AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/bot_payments.db", 5).await?;
//! let api = AccountApi::new(db);
//! let history = api.transactions_for_user(42).await?;
//! ```

pub mod account_objects;
pub mod accounts_api;
pub mod entitlement;
pub mod errors;
pub mod payment_objects;
pub mod reconciliation_api;
pub mod upgrade_api;
