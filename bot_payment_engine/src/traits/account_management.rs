use crate::{
    db_types::{BankDetails, EntitlementGrant, PayoutProfile, Transaction, UpgradeStatus, User},
    traits::LedgerError,
};

/// Read-side queries over users, transactions and grants, plus the small amount of account state (bank details,
/// role upgrades) that lives outside the payment path.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, LedgerError>;

    /// All transactions made by the user, newest first.
    async fn fetch_transactions_for_user(&self, user_id: i64) -> Result<Vec<Transaction>, LedgerError>;

    /// Every transaction in the ledger, newest first.
    async fn fetch_all_transactions(&self) -> Result<Vec<Transaction>, LedgerError>;

    async fn fetch_grants_for_user(&self, user_id: i64) -> Result<Vec<EntitlementGrant>, LedgerError>;

    async fn fetch_grants_for_user_and_bot(
        &self,
        user_id: i64,
        bot_id: i64,
    ) -> Result<Vec<EntitlementGrant>, LedgerError>;

    /// Creates or updates the payout profile for the admin. The subaccount code, if any, is left untouched.
    async fn upsert_bank_details(&self, user_id: i64, details: BankDetails) -> Result<PayoutProfile, LedgerError>;

    async fn set_upgrade_status(&self, user_id: i64, status: UpgradeStatus) -> Result<User, LedgerError>;

    /// Promotes the user to admin, marks the request as approved and creates an empty payout profile, atomically.
    async fn promote_to_admin(&self, user_id: i64) -> Result<User, LedgerError>;

    async fn fetch_users_with_upgrade_status(&self, status: UpgradeStatus) -> Result<Vec<User>, LedgerError>;
}
