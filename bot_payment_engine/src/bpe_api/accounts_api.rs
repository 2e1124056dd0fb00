//! Read-side access to a user's payments and entitlements, and the admin's payout details.

use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    bpe_api::{
        account_objects::{AccessStatus, TransactionSummary},
        errors::AccountApiError,
    },
    db_types::{BankDetails, EntitlementGrant, PayoutProfile, Transaction},
    traits::AccountManagement,
};

pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// All the user's transactions, in every state, newest first.
    pub async fn transactions_for_user(&self, user_id: i64) -> Result<Vec<Transaction>, AccountApiError> {
        let txs = self.db.fetch_transactions_for_user(user_id).await?;
        trace!("{} transactions for user #{user_id}", txs.len());
        Ok(txs)
    }

    /// Every transaction in the ledger along with revenue totals.
    pub async fn transaction_summary(&self) -> Result<TransactionSummary, AccountApiError> {
        let txs = self.db.fetch_all_transactions().await?;
        Ok(TransactionSummary::new(txs))
    }

    pub async fn grants_for_user(&self, user_id: i64) -> Result<Vec<EntitlementGrant>, AccountApiError> {
        let grants = self.db.fetch_grants_for_user(user_id).await?;
        Ok(grants)
    }

    /// Whether the user currently holds an active, unexpired grant on the bot.
    pub async fn access_status(&self, user_id: i64, bot_id: i64) -> Result<AccessStatus, AccountApiError> {
        let now = Utc::now();
        let grant =
            self.db.fetch_grants_for_user_and_bot(user_id, bot_id).await?.into_iter().find(|g| g.is_valid_at(now));
        Ok(AccessStatus { bot_id, has_access: grant.is_some(), grant })
    }

    /// Stores the admin's payout bank details. Any existing subaccount code is kept.
    pub async fn update_bank_details(
        &self,
        user_id: i64,
        details: BankDetails,
    ) -> Result<PayoutProfile, AccountApiError> {
        let details = BankDetails {
            bank_code: details.bank_code.trim().to_string(),
            account_number: details.account_number.trim().to_string(),
            account_name: details.account_name.trim().to_string(),
        };
        if details.bank_code.is_empty() || details.account_number.is_empty() || details.account_name.is_empty() {
            return Err(AccountApiError::InvalidInput(
                "Bank code, account number and account name are all required".into(),
            ));
        }
        if !details.account_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(AccountApiError::InvalidInput("The account number may only contain digits".into()));
        }
        let profile = self.db.upsert_bank_details(user_id, details).await?;
        info!("🗃️ Payout bank details updated for admin #{user_id}");
        Ok(profile)
    }
}
