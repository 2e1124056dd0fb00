use thiserror::Error;

use crate::db_types::{
    Bot,
    EntitlementGrant,
    MinorUnits,
    NewGrant,
    NewSale,
    NewTransaction,
    PayoutProfile,
    PaymentType,
    RevenueSplit,
    Sale,
    Transaction,
    TransactionStatus,
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("A record with the same unique key already exists. {0}")]
    UniqueViolation(String),
    #[error("The transaction with reference {0} does not exist")]
    TransactionNotFound(String),
    #[error("Illegal transaction status change for {reference}: {from} -> {to}")]
    IllegalStatusChange { reference: String, from: TransactionStatus, to: TransactionStatus },
    #[error("The bot with id {0} does not exist")]
    BotNotFound(i64),
    #[error("The user with id {0} does not exist")]
    UserNotFound(i64),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                LedgerError::UniqueViolation(db_err.message().to_string())
            },
            e => LedgerError::DatabaseError(e.to_string()),
        }
    }
}

pub enum InsertTransactionResult {
    Inserted(Transaction),
    AlreadyExists(Transaction),
}

impl InsertTransactionResult {
    pub fn into_inner(self) -> Transaction {
        match self {
            Self::Inserted(tx) | Self::AlreadyExists(tx) => tx,
        }
    }
}

/// The ledger store is the durable record of charges and the substrate for the reconciliation unit of work.
///
/// Methods on this trait each run in their own short transaction (or none at all). Anything that must change
/// transaction status together with ownership and entitlement state goes through a [`LedgerUnit`] obtained from
/// [`LedgerStore::begin_unit`].
#[allow(async_fn_in_trait)]
pub trait LedgerStore: Clone {
    type Unit: LedgerUnit;

    /// The URL of the database
    fn url(&self) -> &str;

    /// Opens an atomic unit of work. Dropping the unit without calling [`LedgerUnit::commit`] rolls everything back.
    async fn begin_unit(&self) -> Result<Self::Unit, LedgerError>;

    async fn fetch_bot(&self, bot_id: i64) -> Result<Option<Bot>, LedgerError>;

    async fn fetch_payout_profile(&self, user_id: i64) -> Result<Option<PayoutProfile>, LedgerError>;

    /// Records the gateway-issued subaccount code against the admin's payout profile.
    async fn save_subaccount_code(&self, user_id: i64, code: &str) -> Result<PayoutProfile, LedgerError>;

    async fn fetch_transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>, LedgerError>;

    /// Returns the most recent transaction for the (user, bot, payment type) triple with the given status.
    async fn find_transaction(
        &self,
        user_id: i64,
        bot_id: i64,
        payment_type: PaymentType,
        status: TransactionStatus,
    ) -> Result<Option<Transaction>, LedgerError>;

    /// Stores a new `pending` transaction. Fails with [`LedgerError::UniqueViolation`] if the reference is taken.
    async fn insert_pending_transaction(&self, tx: NewTransaction) -> Result<Transaction, LedgerError>;

    /// Moves a `pending` transaction to `failed`. Any other starting status is an
    /// [`LedgerError::IllegalStatusChange`].
    async fn mark_transaction_failed(&self, reference: &str) -> Result<Transaction, LedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// One atomic reconciliation. Every write made through a unit becomes visible at once on [`LedgerUnit::commit`], or
/// not at all.
#[allow(async_fn_in_trait)]
pub trait LedgerUnit {
    /// Inserts a `pending` transaction unless one with the same reference already exists.
    async fn insert_transaction(&mut self, tx: NewTransaction) -> Result<InsertTransactionResult, LedgerError>;

    /// Fetches the transaction and takes the write lock that serializes concurrent reconciliations of the same
    /// reference. Must be the first read of the unit.
    async fn lock_transaction(&mut self, reference: &str) -> Result<Option<Transaction>, LedgerError>;

    async fn fetch_bot(&mut self, bot_id: i64) -> Result<Option<Bot>, LedgerError>;

    /// A successful purchase of the bot by this user under a reference other than `excluding_reference`.
    async fn fetch_other_successful_purchase(
        &mut self,
        user_id: i64,
        bot_id: i64,
        excluding_reference: &str,
    ) -> Result<Option<Transaction>, LedgerError>;

    /// Moves a `pending` transaction to `success`, recording the verified amount and the split computed from it.
    async fn mark_transaction_success(
        &mut self,
        reference: &str,
        paid: MinorUnits,
        split: RevenueSplit,
    ) -> Result<Transaction, LedgerError>;

    async fn transfer_ownership(&mut self, bot_id: i64, new_owner: i64) -> Result<(), LedgerError>;

    async fn insert_sale(&mut self, sale: NewSale) -> Result<Sale, LedgerError>;

    /// Deletes every purchase grant on the bot that does not belong to `keep_user`. Returns the number removed.
    async fn revoke_purchase_grants(&mut self, bot_id: i64, keep_user: i64) -> Result<u64, LedgerError>;

    /// Inserts the grant unless an equivalent one exists: for purchases, any purchase grant for the same user and bot;
    /// for rentals, a grant linked to the same transaction. The existing grant is returned in that case.
    async fn insert_grant_if_absent(&mut self, grant: NewGrant) -> Result<EntitlementGrant, LedgerError>;

    async fn commit(self) -> Result<(), LedgerError>;
}
