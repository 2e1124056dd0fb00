use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaystackApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Paystack could not be reached: {0}")]
    Unreachable(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Paystack rejected the request: {0}")]
    Rejected(String),
    #[error("Paystack returned an empty data field")]
    EmptyResponse,
    #[error("Invalid transaction reference: {0}")]
    InvalidReference(String),
    #[error("Malformed webhook payload: {0}")]
    MalformedWebhook(String),
}

impl PaystackApiError {
    /// True when the request may never have reached Paystack, as opposed to Paystack refusing it.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}
