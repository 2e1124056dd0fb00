//! The admin upgrade workflow. Users ask to become admins, superadmins approve or reject, and everyone involved hears
//! about it through the [`NotificationHub`].
use std::fmt::Debug;

use log::*;

use crate::{
    bpe_api::errors::AccountApiError,
    db_types::{Role, UpgradeStatus, User},
    events::NotificationHub,
    traits::AccountManagement,
};

pub struct UpgradeApi<B> {
    db: B,
    hub: NotificationHub,
}

impl<B: Debug> Debug for UpgradeApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UpgradeApi ({:?})", self.db)
    }
}

impl<B> UpgradeApi<B>
where B: AccountManagement
{
    pub fn new(db: B, hub: NotificationHub) -> Self {
        Self { db, hub }
    }

    /// Only plain users may ask. Asking again while a request is pending is an error.
    pub async fn request_upgrade(&self, user_id: i64) -> Result<User, AccountApiError> {
        let user = self.fetch_user(user_id).await?;
        if user.role != Role::User {
            return Err(AccountApiError::InvalidState(format!("User #{user_id} is already a {}", user.role)));
        }
        if user.upgrade_request_status == Some(UpgradeStatus::Pending) {
            return Err(AccountApiError::InvalidState("An upgrade request is already pending".into()));
        }
        let user = self.db.set_upgrade_status(user_id, UpgradeStatus::Pending).await?;
        let message = format!("📩 New upgrade request from {}", user.email);
        let notified = self.hub.broadcast_to_role(Role::SuperAdmin, message);
        info!("🗃️ User #{user_id} requested an admin upgrade. {notified} superadmin(s) notified.");
        Ok(user)
    }

    pub async fn pending_requests(&self) -> Result<Vec<User>, AccountApiError> {
        let users = self.db.fetch_users_with_upgrade_status(UpgradeStatus::Pending).await?;
        Ok(users)
    }

    pub async fn approve_upgrade(&self, user_id: i64) -> Result<User, AccountApiError> {
        self.pending_user(user_id).await?;
        let user = self.db.promote_to_admin(user_id).await?;
        self.hub.send_to_user(
            user_id,
            format!("🎉 Congratulations {}! Your admin upgrade request was approved.", user.name),
        );
        let message = format!("✅ Upgrade approved for user {} ({})", user.name, user.email);
        self.hub.broadcast_to_role(Role::SuperAdmin, message);
        info!("🗃️ Admin upgrade for user #{user_id} approved");
        Ok(user)
    }

    pub async fn reject_upgrade(&self, user_id: i64) -> Result<User, AccountApiError> {
        self.pending_user(user_id).await?;
        let user = self.db.set_upgrade_status(user_id, UpgradeStatus::Rejected).await?;
        self.hub.send_to_user(user_id, "❌ Your admin upgrade request was rejected.");
        info!("🗃️ Admin upgrade for user #{user_id} rejected");
        Ok(user)
    }

    async fn pending_user(&self, user_id: i64) -> Result<User, AccountApiError> {
        let user = self.fetch_user(user_id).await?;
        if user.upgrade_request_status != Some(UpgradeStatus::Pending) {
            return Err(AccountApiError::InvalidState(format!("User #{user_id} has no pending upgrade request")));
        }
        Ok(user)
    }

    async fn fetch_user(&self, user_id: i64) -> Result<User, AccountApiError> {
        self.db.fetch_user(user_id).await?.ok_or_else(|| AccountApiError::NotFound(format!("User #{user_id}")))
    }
}
