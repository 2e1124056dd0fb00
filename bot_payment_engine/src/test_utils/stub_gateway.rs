//! A scriptable in-memory [`PaymentGateway`] for tests.
use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, MutexGuard},
};

use serde::Deserialize;

use crate::{
    db_types::{MinorUnits, PayoutProfile},
    traits::{
        ChargeAuthorization,
        ChargeRequest,
        ChargeStatus,
        GatewayError,
        PaymentGateway,
        VerifiedCharge,
        WebhookEvent,
    },
};

#[derive(Debug, Clone)]
struct StubCharge {
    status: ChargeStatus,
    amount: MinorUnits,
    email: Option<String>,
}

#[derive(Debug, Default)]
struct StubState {
    charges: HashMap<String, StubCharge>,
    unreachable: bool,
    reject_subaccounts: bool,
    verify_calls: usize,
    initialize_requests: Vec<ChargeRequest>,
    subaccounts_created: usize,
}

/// Charges opened through the stub start out `pending` for the requested amount. Tests then decide what the
/// "gateway" reports with [`StubGateway::set_charge`].
#[derive(Debug, Clone)]
pub struct StubGateway {
    secret: String,
    state: Arc<Mutex<StubState>>,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self::new("sk_test_stub")
    }
}

#[derive(Deserialize)]
struct StubWebhook {
    event: String,
    data: Option<StubWebhookData>,
}

#[derive(Deserialize)]
struct StubWebhookData {
    reference: String,
}

impl StubGateway {
    pub fn new(secret: &str) -> Self {
        Self { secret: secret.to_string(), state: Arc::new(Mutex::new(StubState::default())) }
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Scripts what verification reports for `reference`.
    pub fn set_charge(&self, reference: &str, status: ChargeStatus, amount: MinorUnits) {
        let email = self.state().charges.get(reference).and_then(|c| c.email.clone());
        self.state().charges.insert(reference.to_string(), StubCharge { status, amount, email });
    }

    /// Sets the customer email the gateway reports for `reference`. Charges scripted with [`Self::set_charge`] alone
    /// carry no email unless they were opened through the stub.
    pub fn set_customer_email(&self, reference: &str, email: &str) {
        if let Some(charge) = self.state().charges.get_mut(reference) {
            charge.email = Some(email.to_string());
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub fn reject_subaccounts(&self, reject: bool) {
        self.state().reject_subaccounts = reject;
    }

    pub fn verify_calls(&self) -> usize {
        self.state().verify_calls
    }

    pub fn initialize_requests(&self) -> Vec<ChargeRequest> {
        self.state().initialize_requests.clone()
    }

    pub fn subaccounts_created(&self) -> usize {
        self.state().subaccounts_created
    }

    /// A signature the stub will accept for this body.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut hasher = DefaultHasher::new();
        self.secret.hash(&mut hasher);
        body.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    pub fn webhook_body(event: &str, reference: &str) -> Vec<u8> {
        serde_json::json!({ "event": event, "data": { "reference": reference, "status": "success" } })
            .to_string()
            .into_bytes()
    }

    fn check_reachable(&self) -> Result<(), GatewayError> {
        if self.state().unreachable {
            return Err(GatewayError::Unreachable("Stub gateway is offline".into()));
        }
        Ok(())
    }
}

fn raw_status(status: ChargeStatus) -> &'static str {
    match status {
        ChargeStatus::Success => "success",
        ChargeStatus::Pending => "pending",
        ChargeStatus::Abandoned => "abandoned",
        ChargeStatus::Failed => "failed",
        ChargeStatus::Other => "reversed",
    }
}

impl PaymentGateway for StubGateway {
    async fn initialize_charge(&self, request: ChargeRequest) -> Result<ChargeAuthorization, GatewayError> {
        self.check_reachable()?;
        let reference = request.reference.clone();
        let mut state = self.state();
        state.charges.entry(reference.clone()).or_insert_with(|| StubCharge {
            status: ChargeStatus::Pending,
            amount: request.amount,
            email: Some(request.payer_email.clone()),
        });
        state.initialize_requests.push(request);
        Ok(ChargeAuthorization {
            authorization_url: format!("https://checkout.stub/{reference}"),
            access_code: format!("access_{reference}"),
            reference,
        })
    }

    async fn verify_charge(&self, reference: &str) -> Result<VerifiedCharge, GatewayError> {
        self.state().verify_calls += 1;
        self.check_reachable()?;
        let charge = self
            .state()
            .charges
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected("Transaction reference not found".into()))?;
        Ok(VerifiedCharge {
            reference: reference.to_string(),
            status: charge.status,
            paid_amount: charge.amount,
            raw_status: raw_status(charge.status).to_string(),
            customer_email: charge.email,
        })
    }

    async fn create_payout_subaccount(&self, profile: &PayoutProfile) -> Result<String, GatewayError> {
        self.check_reachable()?;
        let mut state = self.state();
        if state.reject_subaccounts {
            return Err(GatewayError::Rejected("Invalid bank details".into()));
        }
        state.subaccounts_created += 1;
        Ok(format!("ACCT_stub_{}", profile.user_id))
    }

    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        self.sign(raw_body) == signature
    }

    fn decode_webhook(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        let StubWebhook { event, data } =
            serde_json::from_slice(raw_body).map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        match (event.as_str(), data) {
            ("charge.success", Some(data)) => Ok(WebhookEvent::ChargeSuccess { reference: data.reference }),
            ("charge.success", None) => Err(GatewayError::MalformedPayload("charge.success without data".into())),
            (other, _) => Ok(WebhookEvent::Ignored { event: other.to_string() }),
        }
    }
}
