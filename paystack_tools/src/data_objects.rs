use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PaystackApiError;

/// Every Paystack response is wrapped in this envelope. `status` is false when Paystack refused the request.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackResponse<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> PaystackResponse<T> {
    pub fn into_data(self) -> Result<T, PaystackApiError> {
        if !self.status {
            return Err(PaystackApiError::Rejected(self.message));
        }
        self.data.ok_or(PaystackApiError::EmptyResponse)
    }
}

//-------------------------------------------  Initialize  -----------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct InitializeTransactionRequest {
    pub email: String,
    /// Amount in minor units.
    pub amount: i64,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subaccount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
    /// Flat amount (minor units) the main account keeps when a subaccount is involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_charge: Option<i64>,
}

impl InitializeTransactionRequest {
    pub fn new(email: &str, amount: i64, reference: &str) -> Self {
        Self {
            email: email.to_string(),
            amount,
            reference: reference.to_string(),
            callback_url: None,
            subaccount: None,
            bearer: None,
            transaction_charge: None,
        }
    }

    /// Routes the charge through a payout subaccount. The subaccount bears the Paystack fees and the main account
    /// keeps `company_charge`.
    pub fn with_subaccount(mut self, subaccount: &str, company_charge: i64) -> Self {
        self.subaccount = Some(subaccount.to_string());
        self.bearer = Some("subaccount".to_string());
        self.transaction_charge = Some(company_charge);
        self
    }

    pub fn with_callback_url(mut self, url: Option<String>) -> Self {
        self.callback_url = url;
        self
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionAuthorization {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

//-------------------------------------------    Verify    -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
    Abandoned,
    Ongoing,
    Pending,
    Processing,
    Queued,
    Reversed,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
            Self::Ongoing => "ongoing",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Queued => "queued",
            Self::Reversed => "reversed",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Customer {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionVerification {
    pub status: TransactionStatus,
    pub reference: String,
    /// Amount actually charged, in minor units.
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub fees: Option<i64>,
    #[serde(default)]
    pub customer: Option<Customer>,
}

//-------------------------------------------  Subaccounts -----------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct CreateSubaccountRequest {
    pub business_name: String,
    pub settlement_bank: String,
    pub account_number: String,
    pub percentage_charge: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Subaccount {
    pub subaccount_code: String,
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub settlement_bank: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
}

//-------------------------------------------   Webhooks   -----------------------------------------------------------
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChargeEventData {
    pub reference: String,
    pub amount: i64,
    pub status: TransactionStatus,
    #[serde(default)]
    pub customer: Option<Customer>,
}

#[derive(Debug, Clone)]
pub enum PaystackEvent {
    ChargeSuccess(ChargeEventData),
    /// Any event this service does not act on. Carries the event name.
    Other(String),
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl PaystackEvent {
    pub const CHARGE_SUCCESS: &'static str = "charge.success";

    /// Decodes a webhook body. Only `charge.success` payloads are decoded in full; a `charge.success` event whose
    /// data does not match the expected shape is an error rather than being skipped.
    pub fn from_slice(body: &[u8]) -> Result<Self, PaystackApiError> {
        let envelope = serde_json::from_slice::<WebhookEnvelope>(body)
            .map_err(|e| PaystackApiError::MalformedWebhook(e.to_string()))?;
        if envelope.event != Self::CHARGE_SUCCESS {
            return Ok(Self::Other(envelope.event));
        }
        let data = serde_json::from_value::<ChargeEventData>(envelope.data)
            .map_err(|e| PaystackApiError::MalformedWebhook(format!("charge.success data: {e}")))?;
        Ok(Self::ChargeSuccess(data))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ChargeSuccess(_) => Self::CHARGE_SUCCESS,
            Self::Other(name) => name.as_str(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verification_response() {
        let json = r#"{
            "status": true,
            "message": "Verification successful",
            "data": {
                "id": 4099260516,
                "domain": "test",
                "status": "success",
                "reference": "ALG_7_1718000000_a1b2c3",
                "amount": 50000,
                "gateway_response": "Successful",
                "currency": "NGN",
                "fees": 850,
                "customer": { "id": 181873746, "email": "buyer@example.com" },
                "subaccount": {}
            }
        }"#;
        let response: PaystackResponse<TransactionVerification> = serde_json::from_str(json).unwrap();
        let data = response.into_data().unwrap();
        assert_eq!(data.status, TransactionStatus::Success);
        assert_eq!(data.amount, 50_000);
        assert_eq!(data.customer.unwrap().email, "buyer@example.com");
    }

    #[test]
    fn unknown_status_is_tolerated() {
        let json = r#"{"status": "bogus", "reference": "r", "amount": 1}"#;
        let data: TransactionVerification = serde_json::from_str(json).unwrap();
        assert_eq!(data.status, TransactionStatus::Unknown);
    }

    #[test]
    fn rejected_envelope() {
        let json = r#"{"status": false, "message": "Transaction reference not found", "data": null}"#;
        let response: PaystackResponse<TransactionVerification> = serde_json::from_str(json).unwrap();
        match response.into_data() {
            Err(PaystackApiError::Rejected(msg)) => assert_eq!(msg, "Transaction reference not found"),
            other => panic!("Expected a rejection, got {other:?}"),
        }
    }

    #[test]
    fn missing_amount_fails_closed() {
        let json = r#"{"status": true, "message": "ok", "data": {"status": "success", "reference": "r"}}"#;
        assert!(serde_json::from_str::<PaystackResponse<TransactionVerification>>(json).is_err());
    }

    #[test]
    fn initialize_request_serialization() {
        let req = InitializeTransactionRequest::new("a@b.com", 50_000, "ref1");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"email": "a@b.com", "amount": 50000, "reference": "ref1"}));
        let req = req.with_subaccount("ACCT_xyz", 15_000).with_callback_url(Some("https://x.io/cb".into()));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["subaccount"], "ACCT_xyz");
        assert_eq!(json["bearer"], "subaccount");
        assert_eq!(json["transaction_charge"], 15000);
        assert_eq!(json["callback_url"], "https://x.io/cb");
    }

    #[test]
    fn webhook_events() {
        let body = br#"{"event":"charge.success","data":{"reference":"abc","amount":500,"status":"success"}}"#;
        match PaystackEvent::from_slice(body).unwrap() {
            PaystackEvent::ChargeSuccess(data) => {
                assert_eq!(data.reference, "abc");
                assert_eq!(data.amount, 500);
            },
            other => panic!("Unexpected event {other:?}"),
        }
        let body = br#"{"event":"transfer.success","data":{"whatever": true}}"#;
        let event = PaystackEvent::from_slice(body).unwrap();
        assert!(matches!(event, PaystackEvent::Other(ref name) if name == "transfer.success"));
        assert_eq!(event.name(), "transfer.success");
    }

    #[test]
    fn malformed_webhooks() {
        assert!(PaystackEvent::from_slice(b"not json").is_err());
        assert!(PaystackEvent::from_slice(br#"{"data":{}}"#).is_err());
        let body = br#"{"event":"charge.success","data":{"amount":500}}"#;
        assert!(matches!(PaystackEvent::from_slice(body), Err(PaystackApiError::MalformedWebhook(_))));
    }
}
