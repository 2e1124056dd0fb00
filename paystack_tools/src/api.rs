use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::PaystackConfig,
    data_objects::{
        CreateSubaccountRequest,
        InitializeTransactionRequest,
        PaystackResponse,
        Subaccount,
        TransactionAuthorization,
        TransactionVerification,
    },
    signature::verify_signature,
    PaystackApiError,
};

#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &PaystackConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, PaystackApiError> {
        let url = self.url(path);
        trace!("🌐️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                PaystackApiError::Unreachable(e.to_string())
            } else {
                PaystackApiError::RestRequestError(e.to_string())
            }
        })?;
        let status = response.status();
        if status.is_success() {
            trace!("🌐️ REST query successful. {status}");
            response.json::<T>().await.map_err(|e| PaystackApiError::JsonError(e.to_string()))
        } else {
            let text = response.text().await.map_err(|e| PaystackApiError::RestRequestError(e.to_string()))?;
            // Paystack explains failures in the usual envelope. Fall back to the raw body if it doesn't.
            let message = serde_json::from_str::<PaystackResponse<serde_json::Value>>(&text)
                .map(|r| r.message)
                .unwrap_or(text);
            Err(PaystackApiError::QueryError { status: status.as_u16(), message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Opens a checkout session. The customer completes payment at the returned `authorization_url`.
    pub async fn initialize_transaction(
        &self,
        request: InitializeTransactionRequest,
    ) -> Result<TransactionAuthorization, PaystackApiError> {
        let reference = request.reference.clone();
        let request = request.with_callback_url(self.config.callback_url.clone());
        debug!("🌐️ Initializing Paystack transaction {reference}");
        let result = self
            .rest_query::<PaystackResponse<TransactionAuthorization>, _>(
                Method::POST,
                "/transaction/initialize",
                Some(request),
            )
            .await?
            .into_data()?;
        info!("🌐️ Paystack transaction {reference} initialized");
        Ok(result)
    }

    pub async fn verify_transaction(&self, reference: &str) -> Result<TransactionVerification, PaystackApiError> {
        if !is_valid_reference(reference) {
            return Err(PaystackApiError::InvalidReference(reference.to_string()));
        }
        let path = format!("/transaction/verify/{reference}");
        debug!("🌐️ Verifying Paystack transaction {reference}");
        let result = self
            .rest_query::<PaystackResponse<TransactionVerification>, ()>(Method::GET, &path, None)
            .await?
            .into_data()?;
        debug!("🌐️ Paystack reports transaction {reference} as {}", result.status.as_str());
        Ok(result)
    }

    pub async fn create_subaccount(&self, request: CreateSubaccountRequest) -> Result<Subaccount, PaystackApiError> {
        debug!("🌐️ Creating Paystack subaccount for {}", request.business_name);
        let result = self
            .rest_query::<PaystackResponse<Subaccount>, _>(Method::POST, "/subaccount", Some(request))
            .await?
            .into_data()?;
        info!("🌐️ Created Paystack subaccount {}", result.subaccount_code);
        Ok(result)
    }

    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        verify_signature(self.config.secret_key.reveal(), body, signature)
    }
}

/// References are embedded in URL paths, so only a conservative character set is accepted.
pub fn is_valid_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference.len() <= 100
        && reference.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '='))
}
