//! Adapts the Paystack REST client to the engine's [`PaymentGateway`] seam.
use bot_payment_engine::{
    db_types::{MinorUnits, PayoutProfile},
    traits::{ChargeAuthorization, ChargeRequest, ChargeStatus, GatewayError, VerifiedCharge, WebhookEvent},
    PaymentGateway,
};
use log::*;
use paystack_tools::{
    CreateSubaccountRequest,
    InitializeTransactionRequest,
    PaystackApi,
    PaystackApiError,
    PaystackConfig,
    PaystackEvent,
    TransactionStatus,
};

#[derive(Clone)]
pub struct PaystackGateway {
    api: PaystackApi,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        let api = PaystackApi::new(config)?;
        Ok(Self { api })
    }
}

impl From<PaystackApi> for PaystackGateway {
    fn from(api: PaystackApi) -> Self {
        Self { api }
    }
}

fn gateway_error(e: PaystackApiError) -> GatewayError {
    match e {
        e if e.is_unreachable() => GatewayError::Unreachable(e.to_string()),
        PaystackApiError::MalformedWebhook(s) => GatewayError::MalformedPayload(s),
        e => GatewayError::Rejected(e.to_string()),
    }
}

fn charge_status(status: TransactionStatus) -> ChargeStatus {
    match status {
        TransactionStatus::Success => ChargeStatus::Success,
        TransactionStatus::Abandoned => ChargeStatus::Abandoned,
        TransactionStatus::Failed => ChargeStatus::Failed,
        TransactionStatus::Ongoing
        | TransactionStatus::Pending
        | TransactionStatus::Processing
        | TransactionStatus::Queued => ChargeStatus::Pending,
        TransactionStatus::Reversed | TransactionStatus::Unknown => ChargeStatus::Other,
    }
}

impl PaymentGateway for PaystackGateway {
    async fn initialize_charge(&self, request: ChargeRequest) -> Result<ChargeAuthorization, GatewayError> {
        let mut req =
            InitializeTransactionRequest::new(&request.payer_email, request.amount.value(), &request.reference);
        if let Some(subaccount) = &request.payout_subaccount {
            let company_charge = request.company_charge.unwrap_or_default();
            req = req.with_subaccount(subaccount, company_charge.value());
        }
        let auth = self.api.initialize_transaction(req).await.map_err(gateway_error)?;
        Ok(ChargeAuthorization {
            authorization_url: auth.authorization_url,
            access_code: auth.access_code,
            reference: auth.reference,
        })
    }

    async fn verify_charge(&self, reference: &str) -> Result<VerifiedCharge, GatewayError> {
        let verification = self.api.verify_transaction(reference).await.map_err(gateway_error)?;
        trace!("🌐️ Verification for {reference}: {verification:?}");
        Ok(VerifiedCharge {
            reference: verification.reference,
            status: charge_status(verification.status),
            paid_amount: MinorUnits::from(verification.amount),
            raw_status: verification.status.as_str().to_string(),
            customer_email: verification.customer.map(|c| c.email),
        })
    }

    async fn create_payout_subaccount(&self, profile: &PayoutProfile) -> Result<String, GatewayError> {
        let request = CreateSubaccountRequest {
            business_name: profile.account_name.clone(),
            settlement_bank: profile.bank_code.clone(),
            account_number: profile.account_number.clone(),
            percentage_charge: self.api.config().subaccount_percentage_charge,
        };
        let subaccount = self.api.create_subaccount(request).await.map_err(gateway_error)?;
        Ok(subaccount.subaccount_code)
    }

    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        self.api.verify_webhook_signature(raw_body, signature)
    }

    fn decode_webhook(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        match PaystackEvent::from_slice(raw_body).map_err(gateway_error)? {
            PaystackEvent::ChargeSuccess(data) => {
                debug!("🌐️ charge.success webhook for {} ({})", data.reference, data.status.as_str());
                Ok(WebhookEvent::ChargeSuccess { reference: data.reference })
            },
            PaystackEvent::Other(event) => Ok(WebhookEvent::Ignored { event }),
        }
    }
}
