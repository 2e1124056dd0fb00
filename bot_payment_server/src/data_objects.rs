use std::fmt::Display;

use bot_payment_engine::payment_objects::WebhookAck;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub reference: String,
}

/// Body of `PATCH /api/payments/status`. `failed` is the only status a client may set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkFailedParams {
    pub reference: String,
    pub status: String,
}

/// What the gateway gets back from a webhook delivery it does not need to repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum WebhookReply {
    Processed(String),
    Ignored(String),
    Declined(String),
}

impl From<&WebhookAck> for WebhookReply {
    fn from(ack: &WebhookAck) -> Self {
        match ack {
            WebhookAck::Processed(outcome) => Self::Processed(outcome.transaction().reference.clone()),
            WebhookAck::Ignored(event) => Self::Ignored(event.clone()),
            WebhookAck::Declined(e) => Self::Declined(e.to_string()),
        }
    }
}
