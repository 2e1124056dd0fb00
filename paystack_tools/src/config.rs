use std::time::Duration;

use bmp_common::Secret;
use log::*;

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SUBACCOUNT_PERCENTAGE: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
    /// Where Paystack redirects the customer's browser after checkout.
    pub callback_url: Option<String>,
    /// Upper bound on every outbound call. A timeout is reported as [`crate::PaystackApiError::Unreachable`].
    pub timeout: Duration,
    /// The default split Paystack applies to a subaccount when a charge does not override it.
    pub subaccount_percentage_charge: f64,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: Secret::default(),
            callback_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            subaccount_percentage_charge: DEFAULT_SUBACCOUNT_PERCENTAGE,
        }
    }
}

impl PaystackConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("BMP_PAYSTACK_BASE_URL").unwrap_or_else(|_| {
            info!("🪛️ BMP_PAYSTACK_BASE_URL not set, using {DEFAULT_BASE_URL}");
            DEFAULT_BASE_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("BMP_PAYSTACK_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ BMP_PAYSTACK_SECRET_KEY not set. Gateway calls will fail and every webhook will be rejected.");
            String::default()
        }));
        let callback_url = std::env::var("BMP_PAYSTACK_CALLBACK_URL").ok().filter(|s| !s.trim().is_empty());
        if callback_url.is_none() {
            warn!("🪛️ BMP_PAYSTACK_CALLBACK_URL not set. Paystack will use the callback url configured on the dashboard.");
        }
        let timeout = std::env::var("BMP_PAYSTACK_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid BMP_PAYSTACK_TIMEOUT_SECS '{s}'. {e}. Using the default."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let subaccount_percentage_charge = std::env::var("BMP_PAYSTACK_SUBACCOUNT_PERCENT")
            .ok()
            .and_then(|s| {
                s.parse::<f64>()
                    .map_err(|e| warn!("🪛️ Invalid BMP_PAYSTACK_SUBACCOUNT_PERCENT '{s}'. {e}. Using the default."))
                    .ok()
            })
            .unwrap_or(DEFAULT_SUBACCOUNT_PERCENTAGE);
        Self { base_url, secret_key, callback_url, timeout, subaccount_percentage_charge }
    }
}
