use thiserror::Error;

use crate::{
    db_types::MinorUnits,
    helpers::PanicError,
    traits::{GatewayError, LedgerError},
};

/// Everything that can go wrong when opening, confirming or failing a charge.
#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid payment type: {0}")]
    InvalidPaymentType(String),
    #[error("Bot #{bot_id} is already owned by this user")]
    AlreadyOwned { bot_id: i64 },
    #[error("Bot #{bot_id} changed hands after charge {reference} was opened. The payment stays pending")]
    PayeeChanged { reference: String, bot_id: i64 },
    #[error("A pending payment already exists for this bot. Reference: {0}")]
    PendingExists(String),
    #[error("Amount too low. Paid {paid}, but at least {expected} is required")]
    AmountTooLow { paid: MinorUnits, expected: MinorUnits },
    #[error("Transaction {0} is closed and cannot change status")]
    TransactionClosed(String),
    #[error("Payment {reference} has not succeeded. The gateway reports '{status}'")]
    PaymentNotSuccessful { reference: String, status: String },
    #[error("Payment gateway unreachable: {0}")]
    GatewayUnreachable(String),
    #[error("Payment gateway rejected the request: {0}")]
    GatewayRejected(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<LedgerError> for ReconciliationError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::TransactionNotFound(r) => Self::NotFound(format!("Transaction {r}")),
            LedgerError::BotNotFound(id) => Self::NotFound(format!("Bot #{id}")),
            LedgerError::UserNotFound(id) => Self::NotFound(format!("User #{id}")),
            LedgerError::IllegalStatusChange { reference, .. } => Self::TransactionClosed(reference),
            e => Self::InternalError(e.to_string()),
        }
    }
}

impl From<GatewayError> for ReconciliationError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unreachable(s) => Self::GatewayUnreachable(s),
            GatewayError::Rejected(s) => Self::GatewayRejected(s),
            GatewayError::MalformedPayload(s) => Self::InvalidInput(s),
        }
    }
}

impl From<PanicError> for ReconciliationError {
    fn from(e: PanicError) -> Self {
        Self::InternalError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Request not allowed: {0}")]
    InvalidState(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<LedgerError> for AccountApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::UserNotFound(id) => Self::NotFound(format!("User #{id}")),
            LedgerError::BotNotFound(id) => Self::NotFound(format!("Bot #{id}")),
            LedgerError::TransactionNotFound(r) => Self::NotFound(format!("Transaction {r}")),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}
