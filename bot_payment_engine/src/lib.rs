//! Bot Payment Engine
//!
//! The engine turns card and bank payments for marketplace bots into durable ledger records, ownership transfers and
//! access grants. It is provider-agnostic: the payment processor sits behind the [`traits::PaymentGateway`] trait and
//! storage behind [`traits::LedgerStore`].
//!
//! The library is divided into these main sections:
//! 1. The ledger store ([`mod@traits`] and the SQLite backend). Callers never touch the database directly; the data
//!    types it stores live in [`mod@db_types`] and are public.
//! 2. The public API ([`mod@bpe_api`]). [`ReconciliationApi`] opens charges and reconciles confirmations arriving by
//!    redirect, frontend callback or webhook. [`AccountApi`] and [`UpgradeApi`] cover the surrounding account
//!    workflows.
//! 3. The [`events::NotificationHub`], which pushes messages to connected users.
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod bpe_api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use bpe_api::{
    account_objects,
    accounts_api::AccountApi,
    entitlement,
    errors::{AccountApiError, ReconciliationError},
    payment_objects,
    reconciliation_api::ReconciliationApi,
    upgrade_api::UpgradeApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDatabase, SqliteLedgerUnit};
pub use traits::{
    AccountManagement,
    InsertTransactionResult,
    LedgerError,
    LedgerStore,
    LedgerUnit,
    PaymentGateway,
};
