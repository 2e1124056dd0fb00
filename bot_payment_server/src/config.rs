use std::{env, io::Write, net::IpAddr};

use bmp_common::{helpers::parse_boolean_flag, Secret};
use log::*;
use paystack_tools::PaystackConfig;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_BMP_HOST: &str = "127.0.0.1";
const DEFAULT_BMP_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/bot_payments.db";
const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    pub paystack: PaystackConfig,
    /// If supplied, requests against /paystack endpoints will be checked against a whitelist of Paystack IP addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub webhook_whitelist: Option<Vec<IpAddr>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BMP_HOST.to_string(),
            port: DEFAULT_BMP_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            paystack: PaystackConfig::default(),
            webhook_whitelist: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("BMP_HOST").ok().unwrap_or_else(|| DEFAULT_BMP_HOST.into());
        let port = env::var("BMP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for BMP_PORT. {e} Using the default, {DEFAULT_BMP_PORT}, instead."
                    );
                    DEFAULT_BMP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_BMP_PORT);
        let database_url = env::var("BMP_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ BMP_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("BMP_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("BMP_USE_FORWARDED").ok(), false);
        let paystack = PaystackConfig::new_from_env_or_default();
        let webhook_whitelist = configure_webhook_whitelist(env::var("BMP_PAYSTACK_WHITELIST").ok());
        Self { host, port, database_url, auth, use_x_forwarded_for, use_forwarded, paystack, webhook_whitelist }
    }
}

fn configure_webhook_whitelist(value: Option<String>) -> Option<Vec<IpAddr>> {
    let whitelist = value.and_then(|s| {
        if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
            info!(
                "🪛️ Paystack IP whitelist is disabled. If this is not what you want, set BMP_PAYSTACK_WHITELIST to a \
                 comma-separated list of IP addresses to enable it."
            );
            return None;
        }
        let ip_addrs = s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| {
                s.parse::<IpAddr>()
                    .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in BMP_PAYSTACK_WHITELIST: {e}"))
                    .ok()
            })
            .collect::<Vec<IpAddr>>();
        Some(ip_addrs)
    });
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The Paystack IP whitelist was configured, but is empty. The server will run, but won't accept any \
                 webhook calls."
            );
        },
        None => {
            info!("🪛️ No Paystack IP whitelist is set. Only signature validation will be used for webhooks.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Paystack IP whitelist: {addrs}");
        },
    }
    whitelist
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC secret used to sign and verify access tokens (HS256).
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this since every issued token becomes invalid on restart. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production \
                         instance, you are doing it wrong! Set the BMP_JWT_SECRET environment variable instead. \
                         🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret.");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Secret::new(secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("BMP_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [BMP_JWT_SECRET]")))?;
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "BMP_JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} characters long"
            )));
        }
        Ok(Self::new(secret))
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
