use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    bpe_api::errors::ReconciliationError,
    db_types::{EntitlementGrant, MinorUnits, PaymentType, Principal, Transaction},
    traits::ChargeAuthorization,
};

/// The channel recorded against every charge opened through the gateway.
pub const PAYMENT_CHANNEL: &str = "paystack";

/// A request to start paying for a bot. The amount is what the client intends to pay; it must cover the list price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeInitRequest {
    pub amount: MinorUnits,
    pub bot_id: i64,
    pub payment_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedCharge {
    pub transaction: Transaction,
    pub authorization: ChargeAuthorization,
}

/// What the frontend believes happened after the checkout redirect. Every field is advisory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackClaim {
    pub reference: String,
    pub bot_id: i64,
    #[serde(default)]
    pub claimed_amount: Option<MinorUnits>,
    pub payment_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// This event moved the transaction to `success` and issued the grant.
    Reconciled { transaction: Transaction, grant: EntitlementGrant },
    /// Another event got there first. Nothing was changed.
    AlreadyReconciled { transaction: Transaction },
    /// The gateway reports the checkout was abandoned. The transaction is now `failed`.
    MarkedFailed { transaction: Transaction },
}

impl ReconcileOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::Reconciled { transaction, .. }
            | Self::AlreadyReconciled { transaction }
            | Self::MarkedFailed { transaction } => transaction,
        }
    }
}

/// How a webhook delivery was disposed of. Every variant is acknowledged to the gateway.
#[derive(Debug, Clone)]
pub enum WebhookAck {
    Processed(ReconcileOutcome),
    Ignored(String),
    Declined(ReconciliationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Redirect,
    Callback,
    Webhook,
}

impl Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSource::Redirect => write!(f, "redirect"),
            EventSource::Callback => write!(f, "callback"),
            EventSource::Webhook => write!(f, "webhook"),
        }
    }
}

/// Everything needed to create the local record when a callback arrives for a reference the ledger has never seen.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub payer: Principal,
    pub bot_id: i64,
    pub payment_type: PaymentType,
    pub description: String,
}

/// The normalized form of a redirect, callback or webhook. All three feed the same reconciliation core.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub reference: String,
    pub source: EventSource,
    pub claimed_amount: Option<MinorUnits>,
    pub synthesis: Option<Synthesis>,
}

impl PaymentEvent {
    pub fn new<S: Into<String>>(reference: S, source: EventSource) -> Self {
        Self { reference: reference.into(), source, claimed_amount: None, synthesis: None }
    }

    pub fn with_claimed_amount(mut self, amount: Option<MinorUnits>) -> Self {
        self.claimed_amount = amount;
        self
    }

    pub fn with_synthesis(mut self, synthesis: Synthesis) -> Self {
        self.synthesis = Some(synthesis);
        self
    }
}
