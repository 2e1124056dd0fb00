use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{MinorUnits, PayoutProfile};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway could not be reached, or did not answer in time. The charge state is unknown.
    #[error("Payment gateway unreachable: {0}")]
    Unreachable(String),
    /// The gateway answered and refused the request, or answered with something that could not be understood.
    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub payer_email: String,
    pub amount: MinorUnits,
    pub reference: String,
    pub payout_subaccount: Option<String>,
    /// What the platform keeps when the charge is routed through a payout subaccount.
    pub company_charge: Option<MinorUnits>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeAuthorization {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Success,
    Pending,
    Abandoned,
    Failed,
    Other,
}

/// What the gateway says actually happened to a charge. This is the only source of truth for amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedCharge {
    pub reference: String,
    pub status: ChargeStatus,
    pub paid_amount: MinorUnits,
    pub raw_status: String,
    pub customer_email: Option<String>,
}

/// A webhook body, once authenticated and decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    ChargeSuccess { reference: String },
    Ignored { event: String },
}

/// The outbound boundary to the card/bank payment processor.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Opens a charge and returns what the client needs to redirect the payer to the checkout page.
    async fn initialize_charge(&self, request: ChargeRequest) -> Result<ChargeAuthorization, GatewayError>;

    async fn verify_charge(&self, reference: &str) -> Result<VerifiedCharge, GatewayError>;

    /// Registers the admin's bank account with the gateway and returns the subaccount code. Callers must check
    /// [`PayoutProfile::has_subaccount`] first.
    async fn create_payout_subaccount(&self, profile: &PayoutProfile) -> Result<String, GatewayError>;

    /// Authenticates a webhook over the raw, undecoded body.
    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool;

    /// Decodes an authenticated webhook body. Only call this after [`Self::verify_webhook_signature`] succeeds.
    fn decode_webhook(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError>;
}
