use sqlx::SqliteConnection;

use crate::{
    db_types::{NewUser, Role, UpgradeStatus, User},
    traits::LedgerError,
};
use super::returned_row;

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, LedgerError> {
    let rows: Vec<User> = sqlx::query_as("INSERT INTO users (name, email, role) VALUES ($1, $2, $3) RETURNING *;")
        .bind(user.name)
        .bind(user.email)
        .bind(user.role.to_string())
        .fetch_all(conn)
        .await?;
    returned_row(rows, "User insert")
}

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, LedgerError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}

pub async fn set_upgrade_status(
    user_id: i64,
    status: UpgradeStatus,
    conn: &mut SqliteConnection,
) -> Result<User, LedgerError> {
    let rows: Vec<User> = sqlx::query_as(
        "UPDATE users SET upgrade_request_status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(user_id)
    .bind(status)
    .fetch_all(conn)
    .await?;
    rows.into_iter().next().ok_or(LedgerError::UserNotFound(user_id))
}

pub async fn set_role(user_id: i64, role: Role, conn: &mut SqliteConnection) -> Result<User, LedgerError> {
    let rows: Vec<User> =
        sqlx::query_as("UPDATE users SET role = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *")
            .bind(user_id)
            .bind(role.to_string())
            .fetch_all(conn)
            .await?;
    rows.into_iter().next().ok_or(LedgerError::UserNotFound(user_id))
}

pub async fn fetch_users_with_upgrade_status(
    status: UpgradeStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<User>, LedgerError> {
    let users = sqlx::query_as("SELECT * FROM users WHERE upgrade_request_status = $1 ORDER BY id")
        .bind(status)
        .fetch_all(conn)
        .await?;
    Ok(users)
}
