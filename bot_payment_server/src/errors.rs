use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use bot_payment_engine::{AccountApiError, ReconciliationError};
use log::error;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("{0}")]
    Payment(#[from] ReconciliationError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::CouldNotIssueToken(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Payment(e) => payment_status_code(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ Request failed with {status}. {self}");
        }
        let body = match self {
            Self::Payment(ReconciliationError::PendingExists(reference)) => {
                json!({ "error": self.to_string(), "reference": reference })
            },
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(status).insert_header(ContentType::json()).body(body.to_string())
    }
}

fn payment_status_code(e: &ReconciliationError) -> StatusCode {
    use ReconciliationError::*;
    match e {
        InvalidInput(_) | InvalidPaymentType(_) | PaymentNotSuccessful { .. } => StatusCode::BAD_REQUEST,
        Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Forbidden(_) => StatusCode::FORBIDDEN,
        NotFound(_) => StatusCode::NOT_FOUND,
        AlreadyOwned { .. } | PayeeChanged { .. } | PendingExists(_) | TransactionClosed(_) => StatusCode::CONFLICT,
        AmountTooLow { .. } => StatusCode::PAYMENT_REQUIRED,
        GatewayRejected(_) => StatusCode::BAD_GATEWAY,
        GatewayUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Could not issue access token. {0}")]
    CouldNotIssueToken(String),
    #[error("Requests from this address are not accepted.")]
    ForbiddenPeer,
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::InvalidInput(s) => Self::Payment(ReconciliationError::InvalidInput(s)),
            AccountApiError::NotFound(s) => Self::NoRecordFound(s),
            AccountApiError::InvalidState(s) => Self::Conflict(s),
            AccountApiError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
        }
    }
}
