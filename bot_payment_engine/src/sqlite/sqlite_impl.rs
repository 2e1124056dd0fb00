//! `SqliteDatabase` is a concrete implementation of a bot payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use log::*;
use sqlx::{migrate::MigrateError, Sqlite, SqlitePool};

use super::db::{admins, bots, db_url, grants, new_pool, sales, transactions, users};
use crate::{
    db_types::{
        BankDetails,
        Bot,
        EntitlementGrant,
        MinorUnits,
        NewBot,
        NewGrant,
        NewSale,
        NewTransaction,
        NewUser,
        PaymentType,
        PayoutProfile,
        RevenueSplit,
        Role,
        Sale,
        Transaction,
        TransactionStatus,
        UpgradeStatus,
        User,
    },
    traits::{AccountManagement, InsertTransactionResult, LedgerError, LedgerStore, LedgerUnit},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

/// A reconciliation unit backed by a SQLite transaction. Dropping it rolls the transaction back.
pub struct SqliteLedgerUnit {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl LedgerUnit for SqliteLedgerUnit {
    async fn insert_transaction(&mut self, tx: NewTransaction) -> Result<InsertTransactionResult, LedgerError> {
        transactions::idempotent_insert(tx, &mut self.tx).await
    }

    async fn lock_transaction(&mut self, reference: &str) -> Result<Option<Transaction>, LedgerError> {
        transactions::lock_transaction(reference, &mut self.tx).await
    }

    async fn fetch_bot(&mut self, bot_id: i64) -> Result<Option<Bot>, LedgerError> {
        bots::fetch_bot(bot_id, &mut self.tx).await
    }

    async fn fetch_other_successful_purchase(
        &mut self,
        user_id: i64,
        bot_id: i64,
        excluding_reference: &str,
    ) -> Result<Option<Transaction>, LedgerError> {
        transactions::fetch_other_successful_purchase(user_id, bot_id, excluding_reference, &mut self.tx).await
    }

    async fn mark_transaction_success(
        &mut self,
        reference: &str,
        paid: MinorUnits,
        split: RevenueSplit,
    ) -> Result<Transaction, LedgerError> {
        transactions::mark_success(reference, paid, split, &mut self.tx).await
    }

    async fn transfer_ownership(&mut self, bot_id: i64, new_owner: i64) -> Result<(), LedgerError> {
        bots::set_owner(bot_id, new_owner, &mut self.tx).await
    }

    async fn insert_sale(&mut self, sale: NewSale) -> Result<Sale, LedgerError> {
        sales::insert_sale(sale, &mut self.tx).await
    }

    async fn revoke_purchase_grants(&mut self, bot_id: i64, keep_user: i64) -> Result<u64, LedgerError> {
        grants::revoke_purchase_grants(bot_id, keep_user, &mut self.tx).await
    }

    async fn insert_grant_if_absent(&mut self, grant: NewGrant) -> Result<EntitlementGrant, LedgerError> {
        grants::insert_grant_if_absent(grant, &mut self.tx).await
    }

    async fn commit(self) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl LedgerStore for SqliteDatabase {
    type Unit = SqliteLedgerUnit;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn begin_unit(&self) -> Result<Self::Unit, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(SqliteLedgerUnit { tx })
    }

    async fn fetch_bot(&self, bot_id: i64) -> Result<Option<Bot>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        bots::fetch_bot(bot_id, &mut conn).await
    }

    async fn fetch_payout_profile(&self, user_id: i64) -> Result<Option<PayoutProfile>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        admins::fetch_payout_profile(user_id, &mut conn).await
    }

    async fn save_subaccount_code(&self, user_id: i64, code: &str) -> Result<PayoutProfile, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let profile = admins::save_subaccount_code(user_id, code, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payout subaccount {code} saved for admin #{user_id}");
        Ok(profile)
    }

    async fn fetch_transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_transaction_by_reference(reference, &mut conn).await
    }

    async fn find_transaction(
        &self,
        user_id: i64,
        bot_id: i64,
        payment_type: PaymentType,
        status: TransactionStatus,
    ) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::find_transaction(user_id, bot_id, payment_type, status, &mut conn).await
    }

    async fn insert_pending_transaction(&self, tx: NewTransaction) -> Result<Transaction, LedgerError> {
        let mut db_tx = self.pool.begin().await?;
        let tx = transactions::insert_transaction(tx, &mut db_tx).await?;
        db_tx.commit().await?;
        debug!("🗃️ Pending transaction [{}] saved with id {}", tx.reference, tx.id);
        Ok(tx)
    }

    async fn mark_transaction_failed(&self, reference: &str) -> Result<Transaction, LedgerError> {
        let mut db_tx = self.pool.begin().await?;
        let tx = transactions::mark_failed(reference, &mut db_tx).await?;
        db_tx.commit().await?;
        debug!("🗃️ Transaction [{reference}] marked as failed");
        Ok(tx)
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user(user_id, &mut conn).await
    }

    async fn fetch_transactions_for_user(&self, user_id: i64) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_transactions_for_user(user_id, &mut conn).await
    }

    async fn fetch_all_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_all_transactions(&mut conn).await
    }

    async fn fetch_grants_for_user(&self, user_id: i64) -> Result<Vec<EntitlementGrant>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        grants::fetch_grants_for_user(user_id, &mut conn).await
    }

    async fn fetch_grants_for_user_and_bot(
        &self,
        user_id: i64,
        bot_id: i64,
    ) -> Result<Vec<EntitlementGrant>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        grants::fetch_grants_for_user_and_bot(user_id, bot_id, &mut conn).await
    }

    async fn upsert_bank_details(&self, user_id: i64, details: BankDetails) -> Result<PayoutProfile, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let profile = admins::upsert_bank_details(user_id, details, &mut tx).await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn set_upgrade_status(&self, user_id: i64, status: UpgradeStatus) -> Result<User, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let user = users::set_upgrade_status(user_id, status, &mut tx).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn promote_to_admin(&self, user_id: i64) -> Result<User, LedgerError> {
        let mut tx = self.pool.begin().await?;
        users::set_role(user_id, Role::Admin, &mut tx).await?;
        let user = users::set_upgrade_status(user_id, UpgradeStatus::Approved, &mut tx).await?;
        admins::ensure_payout_profile(user_id, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ User #{user_id} promoted to admin");
        Ok(user)
    }

    async fn fetch_users_with_upgrade_status(&self, status: UpgradeStatus) -> Result<Vec<User>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_users_with_upgrade_status(status, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_user(&self, user: NewUser) -> Result<User, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let user = users::insert_user(user, &mut tx).await?;
        tx.commit().await?;
        Ok(user)
    }

    pub async fn create_bot(&self, bot: NewBot) -> Result<Bot, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let bot = bots::insert_bot(bot, &mut tx).await?;
        tx.commit().await?;
        Ok(bot)
    }

    pub async fn fetch_sales_for_bot(&self, bot_id: i64) -> Result<Vec<Sale>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        sales::fetch_sales_for_bot(bot_id, &mut conn).await
    }

    pub async fn fetch_grants_for_bot(&self, bot_id: i64) -> Result<Vec<EntitlementGrant>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        grants::fetch_grants_for_bot(bot_id, &mut conn).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        bpe_api::{payment_objects::ChargeInitRequest, reconciliation_api::ReconciliationApi},
        test_utils::{prepare_test_env, random_db_path, seed_marketplace, Marketplace, StubGateway},
    };

    async fn two_pools() -> (SqliteDatabase, SqliteDatabase, Marketplace) {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let market = seed_marketplace(&db, true).await;
        let reader = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating second pool");
        (db, reader, market)
    }

    #[tokio::test]
    async fn seeded_rows_are_committed() {
        let (db, reader, market) = two_pools().await;
        let (bots,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bots").fetch_one(reader.pool()).await.unwrap();
        assert_eq!(bots, 1);
        let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(db.pool()).await.unwrap();
        assert_eq!(users, 4);
        assert!(reader.fetch_bot(market.bot.id).await.unwrap().is_some());
        let profile = reader.fetch_payout_profile(market.seller.id).await.unwrap().expect("profile");
        assert_eq!(profile.account_number, "0123456789");
    }

    #[tokio::test]
    async fn pending_charge_is_visible_to_other_connections() {
        let (db, reader, market) = two_pools().await;
        let api = ReconciliationApi::new(db.clone(), StubGateway::default());
        let request = ChargeInitRequest {
            amount: MinorUnits::from_major(500),
            bot_id: market.bot.id,
            payment_type: "purchase".into(),
            description: None,
        };
        let charge = api.initialize_charge(&Marketplace::principal(&market.buyer), request).await.unwrap();
        let reference = charge.transaction.reference;
        let seen = reader.fetch_transaction_by_reference(&reference).await.unwrap();
        assert_eq!(seen.map(|tx| tx.status), Some(TransactionStatus::Pending));
        // The lazily created subaccount code was committed as well
        let profile = reader.fetch_payout_profile(market.seller.id).await.unwrap().expect("profile");
        assert_eq!(profile.subaccount_code.as_deref(), Some(format!("ACCT_stub_{}", market.seller.id).as_str()));

        db.mark_transaction_failed(&reference).await.unwrap();
        let seen = reader.fetch_transaction_by_reference(&reference).await.unwrap();
        assert_eq!(seen.map(|tx| tx.status), Some(TransactionStatus::Failed));
    }

    #[tokio::test]
    async fn account_writes_do_not_hold_the_write_lock() {
        let (db, reader, market) = two_pools().await;
        db.set_upgrade_status(market.buyer.id, UpgradeStatus::Pending).await.unwrap();
        let user = reader.fetch_user(market.buyer.id).await.unwrap().expect("user");
        assert_eq!(user.upgrade_request_status, Some(UpgradeStatus::Pending));

        // The second pool can write straight away, and the first sees the result
        let dave = reader.create_user(NewUser::new("Dave", "dave@example.com", Role::User)).await.unwrap();
        assert!(db.fetch_user(dave.id).await.unwrap().is_some());
        let details = BankDetails {
            bank_code: "044".into(),
            account_number: "9876543210".into(),
            account_name: "Dave".into(),
        };
        reader.upsert_bank_details(dave.id, details).await.unwrap();
        assert!(db.fetch_payout_profile(dave.id).await.unwrap().is_some());
    }
}
